//! Session configuration resolution.
//!
//! Every setting is resolved once, with priority:
//! 1. Command-line flag
//! 2. Environment variable (`PIPEDRIVER_PIPE`, `PIPEDRIVER_PEER`; empty values ignored)
//! 3. Built-in default
//!
//! The default pipe path is platform specific. On Windows it is the host's
//! named pipe; elsewhere a Unix socket stands in for it, looked up in:
//! 1. `XDG_RUNTIME_DIR/WinUAE.sock`
//! 2. `~/.winuae/WinUAE.sock`
//! 3. System temp dir (last resort)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::args::{Cli, OutputFormat};

/// Named pipe the host application listens on.
#[cfg(windows)]
pub const DEFAULT_PIPE_NAME: &str = r"\\.\pipe\WinUAE";

/// Socket file name used in place of the named pipe.
#[cfg(not(windows))]
pub const DEFAULT_SOCKET_NAME: &str = "WinUAE.sock";

pub const DEFAULT_PEER_NAME: &str = "WinUAE";

pub const PIPE_ENV: &str = "PIPEDRIVER_PIPE";
pub const PEER_ENV: &str = "PIPEDRIVER_PEER";

/// Everything one session attempt needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub pipe_path: PathBuf,
    /// Bound on each multi-wait before the watchdog fires.
    pub wait_timeout: Duration,
    /// Sleep between loop passes while nothing is in flight.
    pub poll_interval: Duration,
    pub peer_name: String,
    pub format: OutputFormat,
}

impl SessionConfig {
    pub fn resolve(cli: &Cli) -> Self {
        let pipe_path = cli
            .pipe
            .as_deref()
            .map(PathBuf::from)
            .or_else(|| env_non_empty(PIPE_ENV).map(PathBuf::from))
            .unwrap_or_else(default_pipe_path);

        let peer_name = cli
            .peer_name
            .clone()
            .or_else(|| env_non_empty(PEER_ENV))
            .unwrap_or_else(|| DEFAULT_PEER_NAME.to_string());

        Self {
            pipe_path,
            wait_timeout: Duration::from_millis(cli.wait_ms),
            poll_interval: Duration::from_millis(cli.poll_ms),
            peer_name,
            format: cli.format,
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(windows)]
pub fn default_pipe_path() -> PathBuf {
    PathBuf::from(DEFAULT_PIPE_NAME)
}

#[cfg(not(windows))]
pub fn default_pipe_path() -> PathBuf {
    if let Some(runtime_dir) = env_non_empty("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(DEFAULT_SOCKET_NAME);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".winuae").join(DEFAULT_SOCKET_NAME);
    }

    env::temp_dir().join(DEFAULT_SOCKET_NAME)
}
