//! Classification of peer replies and the events printed to the console.

use serde::{Deserialize, Serialize};

/// Reply the peer sends for a command it does not recognize.
pub const UNKNOWN_COMMAND_REPLY: &str = "501";

/// Reply the peer sends when a command was passed through without output.
///
/// Only a subset of the peer's command categories produce rich output.
pub const NO_OUTPUT_REPLY: &str = "404";

/// Something the driver reports to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConsoleEvent {
    /// Verbatim output from the peer.
    Output { text: String },
    /// The peer rejected the most recently sent command.
    UnknownCommand { command: String },
    /// The peer accepted the command but had nothing to report.
    NoOutput { command: String },
    /// Every queued command has been sent.
    AllExecuted,
    /// The peer stopped answering within the wait window.
    Unresponsive,
    /// The user interrupted the session.
    Interrupted,
}

impl ConsoleEvent {
    /// Classify a non-empty decoded reply. `last_command` is the text most
    /// recently written to the peer.
    pub fn classify(text: &str, last_command: &str) -> Self {
        match text {
            UNKNOWN_COMMAND_REPLY => ConsoleEvent::UnknownCommand {
                command: last_command.to_string(),
            },
            NO_OUTPUT_REPLY => ConsoleEvent::NoOutput {
                command: last_command.to_string(),
            },
            _ => ConsoleEvent::Output {
                text: text.to_string(),
            },
        }
    }

    /// Human-readable line, with `peer` naming the host application.
    pub fn render(&self, peer: &str) -> String {
        match self {
            ConsoleEvent::Output { text } => format!("{}: {}", peer, text),
            ConsoleEvent::UnknownCommand { command } => {
                format!("{}: unknown command: '{}'", peer, command)
            }
            ConsoleEvent::NoOutput { command } => format!("{}: no output for: '{}'", peer, command),
            ConsoleEvent::AllExecuted => "All commands executed.".to_string(),
            ConsoleEvent::Unresponsive => {
                format!("Waiting for {} to start responding again...", peer)
            }
            ConsoleEvent::Interrupted => "** Keyboard interrupt.".to_string(),
        }
    }
}
