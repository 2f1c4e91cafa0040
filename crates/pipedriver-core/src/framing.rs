//! Decoding of terminator-framed pipe reads into text messages.
//!
//! The peer frames every message as its text bytes followed by a single
//! terminator byte (`0`). One completed read carries at most one message:
//!
//! | Reported length | Region | Result |
//! |---|---|---|
//! | 1 | `[0]` | no message (peer is ending the session) |
//! | L >= 2 | `[.., x, 0]` with `x != 0` | text of the first L-1 bytes |
//! | any | buffer overflow status | whole buffer as text, untrimmed |
//!
//! Anything else is a [`FramingError`].

use crate::error::{FramingError, FramingErrorKind};

/// Byte that ends every inbound message.
pub const TERMINATOR: u8 = 0;

/// Fixed capacity of the buffer handed to every read.
pub const READ_BUFFER_CAPACITY: usize = 512;

/// Status a read completed with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadStatus {
    #[default]
    Complete,
    /// The message did not fit in the supplied buffer.
    BufferOverflow,
}

/// The buffer and outcome of one finished read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCompletion {
    pub buffer: Vec<u8>,
    pub len: usize,
    pub status: ReadStatus,
}

impl ReadCompletion {
    pub fn new(buffer: Vec<u8>, len: usize, status: ReadStatus) -> Self {
        Self {
            buffer,
            len,
            status,
        }
    }

    /// A complete read of exactly `bytes`, for peers that hand back owned data.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec(), bytes.len(), ReadStatus::Complete)
    }

    /// Decode this read into zero or one message.
    pub fn decode(&self) -> Result<Option<String>, FramingError> {
        decode(&self.buffer, self.len, self.status)
    }
}

/// Decode `reported_len` bytes of `buffer` into zero or one text message.
///
/// Empty text is never returned as `Some`.
pub fn decode(
    buffer: &[u8],
    reported_len: usize,
    status: ReadStatus,
) -> Result<Option<String>, FramingError> {
    let fail = |kind| FramingError::new(kind, buffer, reported_len);

    if status == ReadStatus::BufferOverflow {
        return Ok(non_empty(buffer));
    }

    let region = buffer
        .get(..reported_len)
        .ok_or_else(|| fail(FramingErrorKind::LengthExceedsBuffer))?;

    match region {
        [] => Err(fail(FramingErrorKind::Empty)),
        [TERMINATOR] => Ok(None),
        [_] => Err(fail(FramingErrorKind::LoneByteNotTerminator)),
        [.., TERMINATOR, TERMINATOR] => Err(fail(FramingErrorKind::DoubleTerminator)),
        [body @ .., TERMINATOR] => Ok(non_empty(body)),
        _ => Err(fail(FramingErrorKind::MissingTerminator)),
    }
}

fn non_empty(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    (!text.is_empty()).then(|| text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(bytes: &[u8]) -> Vec<u8> {
        let mut buffer = vec![0u8; READ_BUFFER_CAPACITY];
        buffer[..bytes.len()].copy_from_slice(bytes);
        buffer
    }

    #[test]
    fn test_terminated_message_drops_terminator() {
        let buffer = buffer_with(b"404\0");
        let text = decode(&buffer, 4, ReadStatus::Complete).unwrap();
        assert_eq!(text.as_deref(), Some("404"));
    }

    #[test]
    fn test_all_prefix_lengths_decode() {
        let payload = b"D0 00000000 00000000 00000000 00000000";
        for len in 1..payload.len() {
            let mut bytes = payload[..len].to_vec();
            bytes.push(TERMINATOR);
            let buffer = buffer_with(&bytes);
            let text = decode(&buffer, len + 1, ReadStatus::Complete).unwrap();
            assert_eq!(text.as_deref().map(str::as_bytes), Some(&payload[..len]));
        }
    }

    #[test]
    fn test_lone_terminator_is_no_message() {
        let buffer = buffer_with(&[0]);
        assert_eq!(decode(&buffer, 1, ReadStatus::Complete), Ok(None));
    }

    #[test]
    fn test_lone_non_terminator_is_error() {
        let buffer = buffer_with(b"x");
        let err = decode(&buffer, 1, ReadStatus::Complete).unwrap_err();
        assert_eq!(err.kind, FramingErrorKind::LoneByteNotTerminator);
        assert_eq!(err.head, vec![b'x', 0, 0]);
    }

    #[test]
    fn test_missing_terminator_is_error() {
        let buffer = buffer_with(b"abc");
        let err = decode(&buffer, 3, ReadStatus::Complete).unwrap_err();
        assert_eq!(err.kind, FramingErrorKind::MissingTerminator);
    }

    #[test]
    fn test_double_terminator_is_error() {
        let buffer = buffer_with(b"ab\0\0");
        let err = decode(&buffer, 4, ReadStatus::Complete).unwrap_err();
        assert_eq!(err.kind, FramingErrorKind::DoubleTerminator);
    }

    #[test]
    fn test_zero_length_is_error() {
        let buffer = buffer_with(b"");
        let err = decode(&buffer, 0, ReadStatus::Complete).unwrap_err();
        assert_eq!(err.kind, FramingErrorKind::Empty);
    }

    #[test]
    fn test_length_past_buffer_is_error() {
        let err = decode(b"ab\0", 4, ReadStatus::Complete).unwrap_err();
        assert_eq!(err.kind, FramingErrorKind::LengthExceedsBuffer);
    }

    #[test]
    fn test_overflow_decodes_whole_buffer_untrimmed() {
        let buffer = buffer_with(b"partial");
        let text = decode(&buffer, 0, ReadStatus::BufferOverflow)
            .unwrap()
            .expect("overflow always yields text");
        assert_eq!(text.len(), READ_BUFFER_CAPACITY);
        assert!(text.starts_with("partial"));
        assert!(text.ends_with('\0'));
    }

    #[test]
    fn test_overflow_ignores_trailing_bytes() {
        let buffer = vec![b'z'; READ_BUFFER_CAPACITY];
        let text = decode(&buffer, READ_BUFFER_CAPACITY, ReadStatus::BufferOverflow).unwrap();
        assert_eq!(text, Some("z".repeat(READ_BUFFER_CAPACITY)));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let buffer = buffer_with(&[0xff, b'a', 0]);
        let text = decode(&buffer, 3, ReadStatus::Complete).unwrap();
        assert_eq!(text.as_deref(), Some("\u{fffd}a"));
    }

    #[test]
    fn test_completion_decode_uses_reported_length() {
        let completion = ReadCompletion::new(buffer_with(b"ok\0junk"), 3, ReadStatus::Complete);
        assert_eq!(completion.decode().unwrap().as_deref(), Some("ok"));
    }
}
