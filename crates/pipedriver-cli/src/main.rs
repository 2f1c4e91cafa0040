//! pipedriver entry point.

mod args;
mod config;
mod driver;

use anyhow::Context;
use clap::Parser;
use pipedriver_core::commands::CommandQueue;
use pipedriver_core::protocol::ConsoleEvent;
use tracing::{error, info, warn};

use crate::args::Cli;
use crate::config::SessionConfig;
use crate::driver::{Console, SessionError};

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries peer output only
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Run one session attempt, returning the process exit code.
fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = SessionConfig::resolve(&cli);
    let commands = CommandQueue::from_words(&cli.commands);

    // One connection, one loop: nothing here needs more than a single thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(async {
        let mut console = Console::stdout(config.format, config.peer_name.clone());

        // The session future owns the connection; dropping it on interrupt
        // closes the pipe and aborts outstanding requests.
        let outcome = tokio::select! {
            result = driver::run_attempt(&config, commands, &mut console) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(result) => Ok(exit_code(&config.peer_name, result)),
            None => {
                console.emit(&ConsoleEvent::Interrupted);
                Ok(0)
            }
        }
    })
}

/// Log how the session ended and map it to a process exit code.
///
/// A missing pipe means the host is not running, which is not a failure of
/// this process.
fn exit_code(peer_name: &str, result: Result<driver::SessionReport, SessionError>) -> i32 {
    match result {
        Ok(report) => {
            info!(
                "Session finished: {} commands sent, {} replies received",
                report.commands_sent, report.messages_received
            );
            0
        }
        Err(e @ SessionError::PipeNotFound { .. }) => {
            warn!("{} pipe not found: {}", peer_name, e);
            0
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}
