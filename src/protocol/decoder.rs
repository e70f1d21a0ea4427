//! Incremental Request Frame Decoder
//!
//! Clients send every request as a RESP array of bulk strings:
//!
//! ```text
//! *<count>\r\n
//! $<len>\r\n<payload>\r\n      (count times)
//! ```
//!
//! TCP is a stream, so a single read may deliver a partial frame, exactly
//! one frame, or several frames back to back. The decoder therefore works
//! incrementally over an accumulation buffer and returns:
//!
//! - `Ok(Some((tokens, consumed)))` - one complete frame, `consumed` bytes used
//! - `Ok(None)` - the frame is not complete yet, read more
//! - `Err(FrameError)` - the bytes cannot be a valid frame
//!
//! Every declared length is checked against the remaining buffer before any
//! slice is taken, and hard limits bound both element count and bulk string
//! size so a hostile length header cannot balloon memory.
//!
//! A well-formed empty array (`*0\r\n`) decodes successfully to an empty
//! token list. That case is deliberately distinct from every `FrameError`:
//! the frame was fine, the command layer decides what an empty command means.

use crate::protocol::types::{prefix, CRLF};
use bytes::Bytes;
use thiserror::Error;

/// Maximum size for a single bulk string payload (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum number of elements in a request frame
pub const MAX_FRAME_ELEMENTS: usize = 1024;

/// Errors for byte sequences that cannot be a valid request frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    /// The first byte is not the array marker `*`
    #[error("expected array marker '*', got {0:#04x}")]
    MissingArrayMarker(u8),

    /// An element does not start with the bulk string marker `$`
    #[error("expected bulk string marker '$', got {0:#04x}")]
    MissingBulkMarker(u8),

    /// A count or length line is not a valid integer
    #[error("invalid length header: {0:?}")]
    InvalidLength(String),

    /// The element count is negative
    #[error("invalid element count: {0}")]
    InvalidCount(i64),

    /// A bulk string declared a negative length
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(i64),

    /// A bulk string payload is not followed by CRLF
    #[error("bulk string missing trailing CRLF")]
    MissingCrlf,

    /// A declared size exceeds the configured limit
    #[error("frame too large: {size} (max: {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, FrameError>;

/// Decodes request frames from an accumulation buffer.
///
/// # Example
///
/// ```
/// use cachedb::protocol::FrameDecoder;
///
/// let buf = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
/// let (tokens, consumed) = FrameDecoder::new().decode(buf).unwrap().unwrap();
/// assert_eq!(tokens.len(), 2);
/// assert_eq!(consumed, buf.len());
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self
    }

    /// Attempts to decode one request frame from the front of `buf`.
    ///
    /// On success the caller must advance the buffer by `consumed` bytes;
    /// anything after that is the start of the next frame.
    pub fn decode(&self, buf: &[u8]) -> DecodeResult<Option<(Vec<Bytes>, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] != prefix::ARRAY {
            return Err(FrameError::MissingArrayMarker(buf[0]));
        }

        let (count, mut pos) = match read_length_line(&buf[1..])? {
            Some((n, line_len)) => (n, 1 + line_len),
            None => return Ok(None),
        };

        if count < 0 {
            return Err(FrameError::InvalidCount(count));
        }
        let count = count as usize;
        if count > MAX_FRAME_ELEMENTS {
            return Err(FrameError::FrameTooLarge {
                size: count,
                max: MAX_FRAME_ELEMENTS,
            });
        }

        let mut tokens = Vec::with_capacity(count);

        for _ in 0..count {
            match self.decode_bulk(&buf[pos..])? {
                Some((token, used)) => {
                    tokens.push(token);
                    pos += used;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((tokens, pos)))
    }

    /// Decodes one bulk string element: `$<len>\r\n<payload>\r\n`.
    fn decode_bulk(&self, buf: &[u8]) -> DecodeResult<Option<(Bytes, usize)>> {
        if buf.is_empty() {
            return Ok(None);
        }

        if buf[0] != prefix::BULK_STRING {
            return Err(FrameError::MissingBulkMarker(buf[0]));
        }

        let (len, header_len) = match read_length_line(&buf[1..])? {
            Some((n, line_len)) => (n, 1 + line_len),
            None => return Ok(None),
        };

        // Null bulk strings have no place in a request frame.
        if len < 0 {
            return Err(FrameError::InvalidBulkLength(len));
        }
        let len = len as usize;
        if len > MAX_BULK_SIZE {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: MAX_BULK_SIZE,
            });
        }

        // Bounds check before touching the payload.
        let total = header_len + len + CRLF.len();
        if buf.len() < total {
            return Ok(None);
        }

        if &buf[header_len + len..total] != CRLF {
            return Err(FrameError::MissingCrlf);
        }

        let payload = Bytes::copy_from_slice(&buf[header_len..header_len + len]);
        Ok(Some((payload, total)))
    }
}

/// Reads a `<integer>\r\n` line from the front of `buf`.
///
/// Returns the integer and the full line length including CRLF, or `None`
/// if the CRLF has not arrived yet.
fn read_length_line(buf: &[u8]) -> DecodeResult<Option<(i64, usize)>> {
    let crlf = match find_crlf(buf) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    let line = &buf[..crlf];
    let s = std::str::from_utf8(line)
        .map_err(|_| FrameError::InvalidLength(format!("{:?}", line)))?;
    let n: i64 = s
        .parse()
        .map_err(|_| FrameError::InvalidLength(s.to_string()))?;

    Ok(Some((n, crlf + CRLF.len())))
}

/// Finds the position of the first CRLF in the buffer.
#[inline]
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

/// Decodes a single frame from a byte slice.
///
/// Convenience wrapper for callers that do not hold a decoder.
pub fn decode_frame(buf: &[u8]) -> DecodeResult<Option<(Vec<Bytes>, usize)>> {
    FrameDecoder::new().decode(buf)
}
