//! Snapshot Module
//!
//! Point-in-time persistence for the store. Snapshots are written on demand
//! by the BACKUP command, on an elapsed-interval check after every
//! dispatched command, and once more on graceful shutdown. Snapshot
//! failures never crash the server and never touch in-memory state.

pub mod manager;

// Re-export commonly used types
pub use manager::{
    read_snapshot, SnapshotError, SnapshotManager, DEFAULT_BACKUP_INTERVAL, SNAPSHOT_PREFIX,
    SNAPSHOT_SUFFIX,
};
