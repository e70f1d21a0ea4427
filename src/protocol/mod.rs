//! RESP Wire Protocol
//!
//! CacheDB speaks a small subset of the Redis Serialization Protocol:
//! requests are arrays of bulk strings, replies are status lines, error
//! lines, or (possibly null) bulk strings.
//!
//! ## Modules
//!
//! - `decoder`: incremental decoder for incoming request frames
//! - `types`: the `Reply` enum and its wire encoding
//!
//! ## Example
//!
//! ```
//! use cachedb::protocol::{decode_frame, Reply};
//!
//! // Decoding an incoming request
//! let data = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let (tokens, consumed) = decode_frame(data).unwrap().unwrap();
//! assert_eq!(consumed, data.len());
//!
//! // Encoding a reply
//! let reply = Reply::bulk("Ariz");
//! assert_eq!(reply.encode(), b"$4\r\nAriz\r\n");
//! ```

pub mod decoder;
pub mod types;

// Re-export commonly used types for convenience
pub use decoder::{decode_frame, DecodeResult, FrameDecoder, FrameError};
pub use types::Reply;
