//! Where peer output and session notices are printed.

use std::io::{self, Write};

use pipedriver_core::protocol::ConsoleEvent;
use tracing::warn;

use crate::args::OutputFormat;

/// Console sink for [`ConsoleEvent`]s, one line per event.
pub struct Console<W: Write> {
    out: W,
    format: OutputFormat,
    peer_name: String,
}

impl Console<io::Stdout> {
    pub fn stdout(format: OutputFormat, peer_name: impl Into<String>) -> Self {
        Self::new(io::stdout(), format, peer_name)
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W, format: OutputFormat, peer_name: impl Into<String>) -> Self {
        Self {
            out,
            format,
            peer_name: peer_name.into(),
        }
    }

    /// Print one event. A console that can no longer be written to is logged,
    /// not treated as a session failure.
    pub fn emit(&mut self, event: &ConsoleEvent) {
        if let Err(e) = self.write_event(event) {
            warn!("Failed to write to console: {}", e);
        }
    }

    fn write_event(&mut self, event: &ConsoleEvent) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", event.render(&self.peer_name))?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, event)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(console: Console<Vec<u8>>) -> Vec<String> {
        String::from_utf8(console.into_inner())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_text_lines_use_peer_name() {
        let mut console = Console::new(Vec::new(), OutputFormat::Text, "FS-UAE");
        console.emit(&ConsoleEvent::Output {
            text: "ready".to_string(),
        });
        console.emit(&ConsoleEvent::AllExecuted);
        assert_eq!(lines(console), ["FS-UAE: ready", "All commands executed."]);
    }

    #[test]
    fn test_json_lines_parse_back() {
        let mut console = Console::new(Vec::new(), OutputFormat::Json, "WinUAE");
        console.emit(&ConsoleEvent::UnknownCommand {
            command: "bogus".to_string(),
        });
        console.emit(&ConsoleEvent::Unresponsive);

        let events: Vec<ConsoleEvent> = lines(console)
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            events,
            [
                ConsoleEvent::UnknownCommand {
                    command: "bogus".to_string()
                },
                ConsoleEvent::Unresponsive
            ]
        );
    }

    #[test]
    fn test_interrupt_notice_follows_format() {
        let mut console = Console::new(Vec::new(), OutputFormat::Json, "WinUAE");
        console.emit(&ConsoleEvent::Interrupted);
        assert_eq!(lines(console), [r#"{"event":"interrupted"}"#]);

        let mut console = Console::new(Vec::new(), OutputFormat::Text, "WinUAE");
        console.emit(&ConsoleEvent::Interrupted);
        assert_eq!(lines(console), ["** Keyboard interrupt."]);
    }
}
