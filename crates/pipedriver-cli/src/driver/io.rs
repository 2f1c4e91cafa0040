//! The asynchronous I/O boundary the dispatch loop drives.
//!
//! A connection has two request slots, one for reads and one for writes.
//! Issuing a request either finishes on the spot or leaves the slot pending
//! until a later [`PipeIo::wait_any`] reports its completion. Completions
//! carry their [`PendingOperation`] tag, so the loop never has to match a
//! signal back to the slot it belongs to.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use pipedriver_core::framing::ReadCompletion;
use tracing::{error, warn};

use crate::driver::error::SessionError;

/// The two request slots of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOperation {
    Read,
    Write,
}

impl fmt::Display for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingOperation::Read => write!(f, "read"),
            PendingOperation::Write => write!(f, "write"),
        }
    }
}

/// Which slots currently have a request in flight. Holds at most one of each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSet {
    read: bool,
    write: bool,
}

impl PendingSet {
    fn slot(&mut self, op: PendingOperation) -> &mut bool {
        match op {
            PendingOperation::Read => &mut self.read,
            PendingOperation::Write => &mut self.write,
        }
    }

    /// Mark `op` pending. Returns false if it already was.
    pub fn insert(&mut self, op: PendingOperation) -> bool {
        !std::mem::replace(self.slot(op), true)
    }

    /// Clear `op`. Returns false if it was not pending.
    pub fn remove(&mut self, op: PendingOperation) -> bool {
        std::mem::replace(self.slot(op), false)
    }

    pub fn contains(&self, op: PendingOperation) -> bool {
        match op {
            PendingOperation::Read => self.read,
            PendingOperation::Write => self.write,
        }
    }

    pub fn len(&self) -> usize {
        usize::from(self.read) + usize::from(self.write)
    }

    pub fn is_empty(&self) -> bool {
        !self.read && !self.write
    }
}

/// Result of issuing a request.
#[derive(Debug)]
pub enum Issued<T> {
    /// Finished synchronously; nothing is left in flight.
    Completed(T),
    /// In flight; the slot must be waited on.
    Pending,
}

/// A finished request, tagged with its slot.
#[derive(Debug)]
pub enum Completion {
    Read(io::Result<ReadCompletion>),
    Write(io::Result<()>),
}

impl Completion {
    pub fn operation(&self) -> PendingOperation {
        match self {
            Completion::Read(_) => PendingOperation::Read,
            Completion::Write(_) => PendingOperation::Write,
        }
    }
}

/// What one bounded multi-wait observed.
#[derive(Debug)]
pub enum WaitOutcome {
    Completed(Completion),
    /// The slot's completion signal went away before the request finished.
    Abandoned(PendingOperation),
    TimedOut,
    /// The wait itself broke; nothing more can be learned from this connection.
    Failed(String),
}

/// Issue and await asynchronous reads and writes on one connection.
///
/// Implementations never hold more than one request per slot; callers only
/// issue into a slot after its previous request has been reported finished.
pub trait PipeIo {
    /// Start a read into a fresh, zeroed buffer.
    fn issue_read(&mut self) -> io::Result<Issued<ReadCompletion>>;

    /// Start writing `bytes` as-is. No terminator is appended.
    fn issue_write(&mut self, bytes: &[u8]) -> io::Result<Issued<()>>;

    /// Block until one of the `pending` slots finishes, or `timeout` elapses.
    ///
    /// The finished slot is released before returning. A timeout leaves every
    /// request in flight.
    fn wait_any(
        &mut self,
        pending: PendingSet,
        timeout: Duration,
    ) -> impl Future<Output = WaitOutcome>;

    /// Query pipe metadata; fails once the peer end is gone.
    fn pipe_info(&mut self) -> io::Result<()>;

    /// Release the connection and any outstanding requests. Safe to call more
    /// than once and on a connection that never fully opened.
    fn close(&mut self);

    /// Validate the peer is still attached while nothing is in flight.
    fn check_still_connected(&mut self) -> Result<(), SessionError> {
        match self.pipe_info() {
            Ok(()) => Ok(()),
            Err(e) if is_disconnect(&e) => {
                warn!("Pipe no longer connected");
                Err(SessionError::PipeDisconnected)
            }
            Err(e) => {
                error!("Unexpected pipe info error: {}", e);
                Err(SessionError::UnexpectedPipeInfo(e))
            }
        }
    }
}

#[cfg(windows)]
mod win32 {
    pub const ERROR_BROKEN_PIPE: i32 = 109;
    pub const ERROR_NO_DATA: i32 = 232;
    pub const ERROR_PIPE_NOT_CONNECTED: i32 = 233;
}

#[cfg(windows)]
fn is_win32_disconnect(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(win32::ERROR_BROKEN_PIPE | win32::ERROR_NO_DATA | win32::ERROR_PIPE_NOT_CONNECTED)
    )
}

#[cfg(not(windows))]
fn is_win32_disconnect(_err: &io::Error) -> bool {
    false
}

/// Whether `err` means the peer end of the pipe has gone away.
pub fn is_disconnect(err: &io::Error) -> bool {
    is_win32_disconnect(err)
        || matches!(
            err.kind(),
            io::ErrorKind::BrokenPipe
                | io::ErrorKind::NotConnected
                | io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_set_holds_one_of_each() {
        let mut pending = PendingSet::default();
        assert!(pending.is_empty());

        assert!(pending.insert(PendingOperation::Read));
        assert!(!pending.insert(PendingOperation::Read));
        assert_eq!(pending.len(), 1);

        assert!(pending.insert(PendingOperation::Write));
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(PendingOperation::Read));
        assert!(pending.contains(PendingOperation::Write));

        assert!(pending.remove(PendingOperation::Read));
        assert!(!pending.remove(PendingOperation::Read));
        assert_eq!(pending.len(), 1);
        assert!(!pending.contains(PendingOperation::Read));
    }

    #[test]
    fn test_completion_reports_its_slot() {
        let read = Completion::Read(Ok(ReadCompletion::from_bytes(&[0])));
        let write = Completion::Write(Ok(()));
        assert_eq!(read.operation(), PendingOperation::Read);
        assert_eq!(write.operation(), PendingOperation::Write);
    }

    #[test]
    fn test_disconnect_kinds() {
        assert!(is_disconnect(&io::ErrorKind::BrokenPipe.into()));
        assert!(is_disconnect(&io::ErrorKind::UnexpectedEof.into()));
        assert!(is_disconnect(&io::ErrorKind::NotConnected.into()));
        assert!(!is_disconnect(&io::ErrorKind::PermissionDenied.into()));
        assert!(!is_disconnect(&io::ErrorKind::WouldBlock.into()));
    }

    #[cfg(windows)]
    #[test]
    fn test_disconnect_win32_codes() {
        assert!(is_disconnect(&io::Error::from_raw_os_error(
            win32::ERROR_PIPE_NOT_CONNECTED
        )));
        assert!(is_disconnect(&io::Error::from_raw_os_error(
            win32::ERROR_BROKEN_PIPE
        )));
    }
}
