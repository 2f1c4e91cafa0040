//! Errors that end a session attempt.

use std::path::PathBuf;

use pipedriver_core::error::FramingError;
use thiserror::Error;

use crate::driver::io::PendingOperation;

/// Fatal outcomes of one connection attempt.
///
/// Non-fatal conditions (an abandoned slot, a watchdog timeout) are logged
/// by the dispatch loop and never become a `SessionError`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("pipe not found at {}", path.display())]
    PipeNotFound { path: PathBuf },

    #[error("unexpected error opening pipe {}: {source}", path.display())]
    UnexpectedOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pipe disconnected")]
    PipeDisconnected,

    #[error("unexpected pipe info error: {0}")]
    UnexpectedPipeInfo(#[source] std::io::Error),

    #[error("wait failed: {0}")]
    WaitFailed(String),

    #[error(transparent)]
    UnexpectedReadResult(#[from] FramingError),

    #[error("{op} failed: {source}")]
    Io {
        op: PendingOperation,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// Map an I/O failure of `op`, folding disconnects into `PipeDisconnected`.
    pub fn from_io(op: PendingOperation, source: std::io::Error) -> Self {
        if crate::driver::io::is_disconnect(&source) {
            SessionError::PipeDisconnected
        } else {
            SessionError::Io { op, source }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Error, ErrorKind};

    use pipedriver_core::error::FramingErrorKind;

    use super::*;

    #[test]
    fn test_broken_pipe_folds_into_disconnect() {
        let err = SessionError::from_io(PendingOperation::Read, ErrorKind::BrokenPipe.into());
        assert!(matches!(err, SessionError::PipeDisconnected));
    }

    #[test]
    fn test_other_io_keeps_operation() {
        let err = SessionError::from_io(
            PendingOperation::Write,
            Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(
            err,
            SessionError::Io {
                op: PendingOperation::Write,
                ..
            }
        ));
        assert_eq!(err.to_string(), "write failed: denied");
    }

    #[test]
    fn test_framing_error_display_is_transparent() {
        let framing = FramingError::new(FramingErrorKind::MissingTerminator, b"abc", 3);
        let err = SessionError::from(framing.clone());
        assert_eq!(err.to_string(), framing.to_string());
    }

    #[test]
    fn test_not_found_names_path() {
        let err = SessionError::PipeNotFound {
            path: PathBuf::from("/tmp/missing.sock"),
        };
        assert_eq!(err.to_string(), "pipe not found at /tmp/missing.sock");
    }
}
