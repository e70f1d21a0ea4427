//! Command Module
//!
//! The command processing layer: decoded token sequences come in, replies
//! go out, and all store mutation happens here.
//!
//! ```text
//! Session ──> FrameDecoder ──> CommandDispatcher ──> Store
//!                                       │
//!                                       └──> SnapshotManager (BACKUP,
//!                                            auto-backup check)
//! ```

pub mod handler;

// Re-export the dispatcher and command types
pub use handler::{Command, CommandDispatcher, CommandError};
