//! Pipe I/O driver and the session dispatch loop.

pub mod console;
pub mod error;
pub mod io;
pub mod pipe;
pub mod session;

// Public API - used by main.rs
pub use console::Console;
pub use error::SessionError;
pub use session::{run_attempt, SessionReport};
