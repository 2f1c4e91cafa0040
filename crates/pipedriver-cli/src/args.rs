//! CLI argument parsing with clap derive macros.

use clap::{Parser, ValueEnum};

/// Send commands to a host application over its named pipe.
///
/// All command words are joined with spaces, then split on the literal
/// two-character marker \n into consecutive commands. Commands are sent one
/// at a time and every reply is printed as it arrives.
#[derive(Debug, Parser)]
#[command(
    name = "pipedriver",
    version,
    arg_required_else_help = true,
    after_help = "\
Examples:
  pipedriver DBG w 0 bfec01 1 r\\nDBG w 0\\nipc_quit
  pipedriver evt AKS_SOFTRESET 1
  pipedriver evt AKS_STATERESTOREQUICK 1
  pipedriver cfg statefile \\\"C:\\Users\\YOU\\States\\game.uss\\\"\\nevt AKS_STATERESTOREQUICK 1
  pipedriver --format json DBG r 0 100"
)]
pub struct Cli {
    /// Commands to send; separate consecutive commands with a literal \n
    #[arg(
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub commands: Vec<String>,

    /// Pipe path [env: PIPEDRIVER_PIPE] [default: platform pipe path]
    #[arg(long, value_name = "PATH")]
    pub pipe: Option<String>,

    /// How long to wait for a reply before reporting the peer as unresponsive
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    pub wait_ms: u64,

    /// Interval between connection checks once nothing is in flight
    #[arg(long, default_value_t = 1000, value_name = "MS")]
    pub poll_ms: u64,

    /// Name printed in front of peer output [env: PIPEDRIVER_PEER] [default: WinUAE]
    #[arg(long, value_name = "NAME")]
    pub peer_name: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Log wire traffic and driver decisions
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One human-readable line per event
    Text,
    /// One JSON object per event
    Json,
}

#[cfg(test)]
mod tests {
    use super::{Cli, OutputFormat};
    use clap::Parser;

    #[test]
    fn test_commands_collect_trailing_words() {
        let cli = Cli::parse_from(["pipedriver", "DBG", "w", "0", r"bfec01\nDBG", "w", "0"]);
        assert_eq!(cli.commands, ["DBG", "w", "0", r"bfec01\nDBG", "w", "0"]);
        assert_eq!(cli.format, OutputFormat::Text);
        assert_eq!(cli.wait_ms, 1000);
        assert_eq!(cli.poll_ms, 1000);
    }

    #[test]
    fn test_options_before_commands() {
        let cli = Cli::parse_from([
            "pipedriver",
            "--pipe",
            "/tmp/peer.sock",
            "--format",
            "json",
            "--wait-ms",
            "250",
            "evt",
            "AKS_SOFTRESET",
            "1",
        ]);
        assert_eq!(cli.pipe.as_deref(), Some("/tmp/peer.sock"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.wait_ms, 250);
        assert_eq!(cli.commands, ["evt", "AKS_SOFTRESET", "1"]);
    }

    #[test]
    fn test_hyphenated_command_words() {
        let cli = Cli::parse_from(["pipedriver", "cfg", "-x", "--y"]);
        assert_eq!(cli.commands, ["cfg", "-x", "--y"]);
    }

    #[test]
    fn test_commands_required() {
        assert!(Cli::try_parse_from(["pipedriver"]).is_err());
    }
}
