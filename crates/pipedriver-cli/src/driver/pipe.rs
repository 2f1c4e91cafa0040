//! Native pipe connection: open, request slots, liveness check and close.
//!
//! On Windows this is the host's named pipe, opened for overlapped I/O by
//! tokio. Elsewhere a Unix domain socket stands in for it, which is also what
//! the tests run against.
//!
//! Every request is first tried without blocking. If it cannot finish on the
//! spot, the remainder runs as a tokio task and the task's `JoinHandle` is the
//! slot's completion signal.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pipedriver_core::framing::{ReadCompletion, ReadStatus, READ_BUFFER_CAPACITY, TERMINATOR};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::driver::error::SessionError;
use crate::driver::io::{Completion, Issued, PendingOperation, PendingSet, PipeIo, WaitOutcome};

#[cfg(windows)]
type PipeStream = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(unix)]
type PipeStream = tokio::net::UnixStream;

/// Win32 status for a message larger than the read buffer.
#[cfg(windows)]
const ERROR_MORE_DATA: i32 = 234;

/// An open duplex connection to the peer.
pub struct NativePipe {
    path: PathBuf,
    stream: Option<Arc<PipeStream>>,
    read_task: Option<JoinHandle<io::Result<ReadCompletion>>>,
    write_task: Option<JoinHandle<io::Result<()>>>,
}

impl NativePipe {
    /// Open the pipe at `path` for duplex asynchronous I/O.
    pub async fn open(path: &Path) -> Result<Self, SessionError> {
        match connect(path).await {
            Ok(stream) => {
                debug!("Connected to {:?}", path);
                Ok(Self {
                    path: path.to_path_buf(),
                    stream: Some(Arc::new(stream)),
                    read_task: None,
                    write_task: None,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SessionError::PipeNotFound {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(SessionError::UnexpectedOpen {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn stream(&self) -> io::Result<Arc<PipeStream>> {
        self.stream
            .clone()
            .ok_or_else(|| io::ErrorKind::NotConnected.into())
    }

    fn release(&mut self, op: PendingOperation) {
        match op {
            PendingOperation::Read => self.read_task = None,
            PendingOperation::Write => self.write_task = None,
        }
    }
}

#[cfg(windows)]
async fn connect(path: &Path) -> io::Result<PipeStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(path)
}

#[cfg(unix)]
async fn connect(path: &Path) -> io::Result<PipeStream> {
    tokio::net::UnixStream::connect(path).await
}

#[cfg(windows)]
fn is_more_data(err: &io::Error) -> bool {
    err.raw_os_error() == Some(ERROR_MORE_DATA)
}

#[cfg(not(windows))]
fn is_more_data(_err: &io::Error) -> bool {
    false
}

/// One non-blocking read attempt. `None` means nothing is available yet.
///
/// A buffer filled to the last byte without a terminator is reported as an
/// overflow: the message did not fit.
fn try_read_message(
    stream: &PipeStream,
    buffer: &mut [u8],
) -> io::Result<Option<(usize, ReadStatus)>> {
    match stream.try_read(buffer) {
        Ok(0) => Err(io::ErrorKind::UnexpectedEof.into()),
        Ok(len) if len == buffer.len() && buffer.last() != Some(&TERMINATOR) => {
            Ok(Some((len, ReadStatus::BufferOverflow)))
        }
        Ok(len) => Ok(Some((len, ReadStatus::Complete))),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) if is_more_data(&e) => Ok(Some((buffer.len(), ReadStatus::BufferOverflow))),
        Err(e) => Err(e),
    }
}

/// One non-blocking write attempt, returning how many bytes went out.
fn try_write_some(stream: &PipeStream, bytes: &[u8]) -> io::Result<usize> {
    match stream.try_write(bytes) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

async fn read_when_ready(
    stream: Arc<PipeStream>,
    mut buffer: Vec<u8>,
) -> io::Result<ReadCompletion> {
    loop {
        stream.readable().await?;
        if let Some((len, status)) = try_read_message(&stream, &mut buffer)? {
            return Ok(ReadCompletion::new(buffer, len, status));
        }
    }
}

async fn write_when_ready(stream: Arc<PipeStream>, remaining: Vec<u8>) -> io::Result<()> {
    let mut offset = 0;
    while offset < remaining.len() {
        stream.writable().await?;
        offset += try_write_some(&stream, &remaining[offset..])?;
    }
    Ok(())
}

async fn join_slot<T>(slot: Option<&mut JoinHandle<T>>) -> Result<T, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl PipeIo for NativePipe {
    fn issue_read(&mut self) -> io::Result<Issued<ReadCompletion>> {
        let stream = self.stream()?;
        let mut buffer = vec![0u8; READ_BUFFER_CAPACITY];

        if let Some((len, status)) = try_read_message(&stream, &mut buffer)? {
            return Ok(Issued::Completed(ReadCompletion::new(buffer, len, status)));
        }

        self.read_task = Some(tokio::spawn(read_when_ready(stream, buffer)));
        Ok(Issued::Pending)
    }

    fn issue_write(&mut self, bytes: &[u8]) -> io::Result<Issued<()>> {
        let stream = self.stream()?;
        let written = try_write_some(&stream, bytes)?;
        if written == bytes.len() {
            return Ok(Issued::Completed(()));
        }

        let remaining = bytes[written..].to_vec();
        self.write_task = Some(tokio::spawn(write_when_ready(stream, remaining)));
        Ok(Issued::Pending)
    }

    async fn wait_any(&mut self, pending: PendingSet, timeout: Duration) -> WaitOutcome {
        if pending.is_empty() {
            return WaitOutcome::Failed("no requests in flight".to_string());
        }

        let read = match (pending.contains(PendingOperation::Read), self.read_task.as_mut()) {
            (false, _) => None,
            (true, Some(handle)) => Some(handle),
            (true, None) => return WaitOutcome::Failed("read slot has no request".to_string()),
        };
        let write = match (pending.contains(PendingOperation::Write), self.write_task.as_mut()) {
            (false, _) => None,
            (true, Some(handle)) => Some(handle),
            (true, None) => return WaitOutcome::Failed("write slot has no request".to_string()),
        };

        let joined = tokio::time::timeout(timeout, async move {
            tokio::select! {
                biased;
                result = join_slot(read) => (PendingOperation::Read, result.map(Completion::Read)),
                result = join_slot(write) => (PendingOperation::Write, result.map(Completion::Write)),
            }
        })
        .await;

        let Ok((op, result)) = joined else {
            return WaitOutcome::TimedOut;
        };
        self.release(op);

        match result {
            Ok(completion) => WaitOutcome::Completed(completion),
            Err(e) if e.is_cancelled() => WaitOutcome::Abandoned(op),
            Err(e) => WaitOutcome::Failed(format!("{} request panicked: {}", op, e)),
        }
    }

    fn pipe_info(&mut self) -> io::Result<()> {
        let stream = self.stream()?;
        probe(&stream)
    }

    fn close(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        if let Some(task) = self.write_task.take() {
            task.abort();
        }
        if self.stream.take().is_some() {
            debug!("Closed {:?}", self.path);
        }
    }
}

impl Drop for NativePipe {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(windows)]
fn probe(stream: &PipeStream) -> io::Result<()> {
    stream.info().map(|_| ())
}

/// Peek one byte without consuming it. A zero-length peek means the peer
/// closed its end.
#[cfg(unix)]
fn probe(stream: &PipeStream) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let mut byte = 0u8;
    // SAFETY: the fd is owned by `stream`, which outlives the call, and the
    // buffer is a single writable byte on our stack.
    let rc = unsafe {
        libc::recv(
            stream.as_raw_fd(),
            (&mut byte as *mut u8).cast(),
            1,
            libc::MSG_PEEK | libc::MSG_DONTWAIT,
        )
    };

    match rc {
        0 => Err(io::ErrorKind::NotConnected.into()),
        n if n > 0 => Ok(()),
        _ => {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}
