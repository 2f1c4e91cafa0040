//! Framing errors raised while decoding pipe reads.

use std::fmt;

/// How many leading buffer bytes are kept for diagnostics.
pub const DIAGNOSTIC_BYTES: usize = 3;

/// Which framing rule a read violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingErrorKind {
    /// The read reported zero bytes.
    Empty,
    /// The reported length is larger than the buffer it refers to.
    LengthExceedsBuffer,
    /// A single-byte read whose byte is not the terminator.
    LoneByteNotTerminator,
    /// The last byte of the region is not the terminator.
    MissingTerminator,
    /// The region ends in two terminators, so the message body is empty.
    DoubleTerminator,
}

impl fmt::Display for FramingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingErrorKind::Empty => write!(f, "empty read"),
            FramingErrorKind::LengthExceedsBuffer => write!(f, "length exceeds buffer"),
            FramingErrorKind::LoneByteNotTerminator => write!(f, "lone byte is not a terminator"),
            FramingErrorKind::MissingTerminator => write!(f, "missing terminator"),
            FramingErrorKind::DoubleTerminator => write!(f, "double terminator"),
        }
    }
}

/// A read whose bytes do not follow the terminator framing.
///
/// The decoder cannot resynchronize after one of these, so callers treat it
/// as fatal to the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramingError {
    pub kind: FramingErrorKind,
    pub reported_len: usize,
    /// First bytes of the buffer, at most [`DIAGNOSTIC_BYTES`].
    pub head: Vec<u8>,
}

impl FramingError {
    pub fn new(kind: FramingErrorKind, buffer: &[u8], reported_len: usize) -> Self {
        let head = buffer[..buffer.len().min(DIAGNOSTIC_BYTES)].to_vec();
        Self {
            kind,
            reported_len,
            head,
        }
    }
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unexpected read result ({}, {} bytes reported)",
            self.kind, self.reported_len
        )?;
        for (i, byte) in self.head.iter().enumerate() {
            write!(f, " {}: '{}'", i, byte)?;
        }
        Ok(())
    }
}

impl std::error::Error for FramingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_is_capped() {
        let err = FramingError::new(FramingErrorKind::MissingTerminator, b"abcdef", 6);
        assert_eq!(err.head, b"abc".to_vec());
    }

    #[test]
    fn test_head_shorter_than_cap() {
        let err = FramingError::new(FramingErrorKind::LoneByteNotTerminator, b"x", 1);
        assert_eq!(err.head, b"x".to_vec());
    }

    #[test]
    fn test_display_lists_diagnostic_bytes() {
        let err = FramingError::new(FramingErrorKind::MissingTerminator, &[65, 66, 67, 68], 4);
        let display = err.to_string();
        assert!(display.contains("missing terminator"));
        assert!(display.contains("4 bytes reported"));
        assert!(display.contains("0: '65'"));
        assert!(display.contains("2: '67'"));
        assert!(!display.contains("3: "));
    }
}
