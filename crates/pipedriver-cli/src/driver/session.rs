//! The dispatch loop for one connection attempt.
//!
//! ```text
//! Connecting -> Active (requests in flight | nothing in flight) -> Idling -> Terminated
//! ```
//!
//! Each command gets a read for its reply window, issued before the command's
//! write. The loop then waits on whichever slots are in flight, bounded by the
//! wait timeout. A timeout only trips the watchdog notice; the requests stay
//! in flight. Once both slots are clear the next read/write pair goes out, or,
//! with nothing left to send, the loop idles and re-checks that the peer is
//! still attached.

use std::io::Write;
use std::time::Duration;

use pipedriver_core::commands::CommandQueue;
use pipedriver_core::framing::ReadCompletion;
use pipedriver_core::protocol::ConsoleEvent;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::driver::console::Console;
use crate::driver::error::SessionError;
use crate::driver::io::{Completion, Issued, PendingOperation, PendingSet, PipeIo, WaitOutcome};
use crate::driver::pipe::NativePipe;

/// Loop timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&SessionConfig> for Timing {
    fn from(config: &SessionConfig) -> Self {
        Self {
            wait_timeout: config.wait_timeout,
            poll_interval: config.poll_interval,
        }
    }
}

/// What a session that ran to completion did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub commands_sent: usize,
    pub messages_received: usize,
}

/// Open the configured pipe and drive `commands` through it.
pub async fn run_attempt<W: Write>(
    config: &SessionConfig,
    commands: CommandQueue,
    console: &mut Console<W>,
) -> Result<SessionReport, SessionError> {
    let mut pipe = NativePipe::open(&config.pipe_path).await?;
    run(&mut pipe, commands, console, Timing::from(config)).await
}

/// Drive `commands` through an open connection, closing it on every exit.
///
/// The peer going away once every command has been sent is a normal end.
pub async fn run<P: PipeIo, W: Write>(
    pipe: &mut P,
    commands: CommandQueue,
    console: &mut Console<W>,
    timing: Timing,
) -> Result<SessionReport, SessionError> {
    let mut session = Session {
        pipe,
        commands,
        console,
        timing,
        pending: PendingSet::default(),
        last_command: String::new(),
        responsive: true,
        report: SessionReport::default(),
    };

    let result = match session.drive().await {
        Err(SessionError::PipeDisconnected) if session.commands.is_exhausted() => {
            info!("Peer closed the pipe");
            Ok(())
        }
        other => other,
    };
    session.pipe.close();
    result.map(|()| session.report)
}

/// State of one connection attempt, owned by the loop for its whole life.
struct Session<'a, P, W: Write> {
    pipe: &'a mut P,
    commands: CommandQueue,
    console: &'a mut Console<W>,
    timing: Timing,
    pending: PendingSet,
    /// Text of the most recent write, quoted back when the peer rejects it.
    last_command: String,
    responsive: bool,
    report: SessionReport,
}

impl<P: PipeIo, W: Write> Session<'_, P, W> {
    async fn drive(&mut self) -> Result<(), SessionError> {
        self.send_next()?;

        loop {
            if self.pending.is_empty() {
                self.idle().await?;
                continue;
            }

            debug!("Waiting on {} request(s)", self.pending.len());
            let outcome = self
                .pipe
                .wait_any(self.pending, self.timing.wait_timeout)
                .await;
            self.dispatch(outcome)?;
        }
    }

    /// Issue the read for the next reply window, then the next command.
    fn send_next(&mut self) -> Result<(), SessionError> {
        self.issue_read()?;
        if let Some(command) = self.commands.next_command() {
            self.issue_write(command)?;
        }
        Ok(())
    }

    async fn idle(&mut self) -> Result<(), SessionError> {
        if !self.commands.is_exhausted() {
            self.send_next()?;
        } else if self.commands.take_completion_notice() {
            self.console.emit(&ConsoleEvent::AllExecuted);
        }

        if self.commands.is_exhausted() {
            self.pipe.check_still_connected()?;
        }

        if self.pending.is_empty() {
            tokio::time::sleep(self.timing.poll_interval).await;
        }
        Ok(())
    }

    fn issue_read(&mut self) -> Result<(), SessionError> {
        match self.pipe.issue_read() {
            Ok(Issued::Completed(completion)) => self.handle_read(completion),
            Ok(Issued::Pending) => {
                self.mark_pending(PendingOperation::Read);
                Ok(())
            }
            Err(e) => Err(SessionError::from_io(PendingOperation::Read, e)),
        }
    }

    fn issue_write(&mut self, command: String) -> Result<(), SessionError> {
        debug!("Sending: {}", command);
        let issued = self.pipe.issue_write(command.as_bytes());
        self.last_command = command;

        match issued {
            Ok(Issued::Completed(())) => {}
            Ok(Issued::Pending) => self.mark_pending(PendingOperation::Write),
            Err(e) => return Err(SessionError::from_io(PendingOperation::Write, e)),
        }
        self.report.commands_sent += 1;
        Ok(())
    }

    fn mark_pending(&mut self, op: PendingOperation) {
        let inserted = self.pending.insert(op);
        debug_assert!(inserted, "{} issued while one was already in flight", op);
    }

    fn handle_read(&mut self, completion: ReadCompletion) -> Result<(), SessionError> {
        let Some(text) = completion.decode()? else {
            debug!("Received terminator-only read");
            return Ok(());
        };

        debug!("Received: {}", text);
        self.report.messages_received += 1;
        let event = ConsoleEvent::classify(&text, &self.last_command);
        self.console.emit(&event);
        Ok(())
    }

    fn dispatch(&mut self, outcome: WaitOutcome) -> Result<(), SessionError> {
        let completion = match outcome {
            WaitOutcome::TimedOut => {
                if self.responsive {
                    self.console.emit(&ConsoleEvent::Unresponsive);
                }
                self.responsive = false;
                return Ok(());
            }
            WaitOutcome::Failed(reason) => return Err(SessionError::WaitFailed(reason)),
            WaitOutcome::Abandoned(op) => {
                self.responsive = true;
                warn!("Abandoned {}", op);
                self.pending.remove(op);
                return Ok(());
            }
            WaitOutcome::Completed(completion) => completion,
        };

        if !self.responsive {
            debug!("Peer is responding again");
        }
        self.responsive = true;
        self.pending.remove(completion.operation());

        match completion {
            Completion::Read(result) => {
                let completion =
                    result.map_err(|e| SessionError::from_io(PendingOperation::Read, e))?;
                self.handle_read(completion)
            }
            Completion::Write(result) => {
                result.map_err(|e| SessionError::from_io(PendingOperation::Write, e))
            }
        }
    }
}
