//! Core types and logic for pipedriver.
//!
//! This crate holds the runtime-free half of the driver: everything that can
//! be decided from bytes and command text alone, with no pipe or event loop
//! involved.
//!
//! # Modules
//!
//! - [`framing`]: terminator framing of inbound reads
//! - [`commands`]: the ordered command queue and its send cursor
//! - [`protocol`]: reply classification and console events
//! - [`error`]: framing violations
//!
//! # Wire Format
//!
//! | Direction | Format |
//! |-----------|--------|
//! | **Outbound** | raw command text, no terminator added |
//! | **Inbound** | message text followed by one `0` byte |
//!
//! A lone `0` byte inbound carries no message; the peer sends it when it is
//! ending the session.

pub mod commands;
pub mod error;
pub mod framing;
pub mod protocol;
