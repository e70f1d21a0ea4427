//! Connection Module
//!
//! Per-client session handling. The listener accepts a connection, builds
//! a [`Session`] over the shared dispatcher, and spawns it as its own
//! Tokio task:
//!
//! ```text
//! Listener ──accept──> Session ──> decode ──> dispatch ──> encode ──> write
//!                        ▲                                              │
//!                        └──────────────────loop───────────────────────┘
//! ```
//!
//! Sessions share nothing mutable except the store (behind its lock) and
//! the snapshot manager, both reached through the dispatcher handle.

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionStats, Session};
