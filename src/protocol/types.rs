//! RESP Reply Types
//!
//! CacheDB replies to every request with one of three RESP reply kinds.
//! Requests are always arrays of bulk strings and are handled by the
//! decoder in [`crate::protocol::decoder`]; this module covers the
//! server-to-client direction only.
//!
//! ## Wire Format
//!
//! Simple status: `+OK\r\n`
//! Error: `-ERR unknown command\r\n`
//! Bulk string: `$5\r\nhello\r\n`
//! Null bulk string: `$-1\r\n`
//!
//! All replies are terminated with CRLF (`\r\n`).

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used throughout the RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP type prefix bytes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// A reply sent back to the client.
///
/// Covers the three reply kinds the server produces: status lines,
/// error lines, and (possibly null) bulk strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Non-binary status line. Must not contain CRLF.
    /// Format: `+<text>\r\n`
    Simple(String),

    /// Error line, same shape as a status line but signalling failure.
    /// Format: `-<message>\r\n`
    Error(String),

    /// Binary-safe payload, or the null bulk string when absent.
    /// Format: `$<len>\r\n<data>\r\n`, null: `$-1\r\n`
    Bulk(Option<Bytes>),
}

impl Reply {
    /// Creates a status reply.
    pub fn simple(s: impl Into<String>) -> Self {
        Reply::Simple(s.into())
    }

    /// Creates an error reply.
    pub fn error(s: impl Into<String>) -> Self {
        Reply::Error(s.into())
    }

    /// Creates a bulk string reply carrying a value.
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Reply::Bulk(Some(data.into()))
    }

    /// Creates the null bulk string reply (absent key).
    pub fn null() -> Self {
        Reply::Bulk(None)
    }

    /// The canonical reply for a successful write.
    pub fn ok() -> Self {
        Reply::Simple("OK".to_string())
    }

    /// The canonical reply to PING.
    pub fn pong() -> Self {
        Reply::Simple("PONG".to_string())
    }

    /// Returns true if this reply signals an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Encodes the reply to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Encodes the reply into an existing buffer.
    ///
    /// More efficient than `encode()` when a buffer can be reused.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Reply::Simple(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            Reply::Bulk(Some(data)) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            Reply::Bulk(None) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(b"-1");
                buf.extend_from_slice(CRLF);
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "{}", s),
            Reply::Error(s) => write!(f, "(error) {}", s),
            Reply::Bulk(Some(data)) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            Reply::Bulk(None) => write!(f, "(nil)"),
        }
    }
}
