//! # CacheDB - A Minimal In-Memory Cache Server with Snapshots
//!
//! CacheDB is a small key-value cache server speaking a subset of the
//! Redis wire protocol (RESP) over TCP, with manual and interval-based
//! snapshotting of the store to disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           CacheDB                            │
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐  │
//! │  │ TCP Server  │───>│   Session   │───>│ CommandDispatcher│  │
//! │  │ (Listener)  │    │ (per client)│    └────────┬─────────┘  │
//! │  └─────────────┘    └──────┬──────┘             │            │
//! │                           │                     ▼            │
//! │                    ┌──────┴──────┐      ┌─────────────┐      │
//! │                    │FrameDecoder │      │    Store    │      │
//! │                    │   / Reply   │      │  (RwLock)   │      │
//! │                    └─────────────┘      └──────┬──────┘      │
//! │                                                │             │
//! │                                       ┌────────┴──────────┐  │
//! │                                       │  SnapshotManager  │  │
//! │                                       │ (BACKUP + timed)  │  │
//! │                                       └───────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `PING` - liveness check
//! - `SET key value` - insert or overwrite a key
//! - `GET key` - fetch a value, null bulk string if absent
//! - `BACKUP` - synchronously snapshot the store to disk
//!
//! ## Snapshots
//!
//! Besides the explicit `BACKUP` command, a snapshot is written whenever a
//! command completes and more than the backup interval (default 5 minutes)
//! has passed since the last successful save. The check runs only on
//! command boundaries, so an idle server writes nothing. Snapshot files
//! are uniquely named, written atomically via temp-file-then-rename, and
//! never pruned.
//!
//! ## Concurrency
//!
//! One Tokio task per connection. The store is a single `RwLock`-guarded
//! map, so each command executes atomically against it; snapshot
//! triggering is serialized by the snapshot manager's own mutex. A slow
//! disk during BACKUP stalls only the requesting connection, not the
//! whole server.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP frame decoder and reply encoding
//! - [`storage`]: the shared key-value store
//! - [`commands`]: command parsing and dispatch
//! - [`snapshot`]: snapshot writing, reading, and the auto-backup check
//! - [`connection`]: per-client session state machine

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod snapshot;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{Command, CommandDispatcher, CommandError};
pub use connection::{handle_connection, ConnectionStats, Session};
pub use protocol::{FrameDecoder, FrameError, Reply};
pub use snapshot::{read_snapshot, SnapshotError, SnapshotManager};
pub use storage::Store;

/// The default port CacheDB listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host CacheDB binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of CacheDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
