//! Snapshot Manager
//!
//! Serializes the store to a uniquely named file on disk, either on demand
//! (the BACKUP command) or when the auto-backup interval has elapsed.
//!
//! ## File format
//!
//! Newline-delimited, binary-safe:
//!
//! ```text
//! <pair count>\n
//! <key length>\n
//! <key bytes>\n
//! <value length>\n
//! <value bytes>\n        (repeated per pair)
//! ```
//!
//! Payload bytes are read back by their declared length, never by line, so
//! keys and values may contain newlines.
//!
//! ## Durability
//!
//! Each snapshot is written to a `.tmp` file, flushed and fsynced, then
//! renamed into place. A crash mid-write leaves at most a stray temp file,
//! never a truncated snapshot. Filenames carry a local timestamp plus a
//! monotonic sequence number, so rapid consecutive saves cannot collide
//! and an existing snapshot is never overwritten. Snapshots are never
//! pruned.

use crate::storage::Store;
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Fixed prefix of every snapshot filename
pub const SNAPSHOT_PREFIX: &str = "snapshot-";

/// Fixed suffix of every snapshot filename
pub const SNAPSHOT_SUFFIX: &str = ".db";

/// Default interval between automatic backups (5 minutes)
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(300);

/// Errors from writing or reading snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot file could not be opened, written, or read
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot file exists where the new one would be written
    #[error("snapshot already exists: {0}")]
    AlreadyExists(PathBuf),

    /// A snapshot file does not match the expected format
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

/// Manages on-demand and interval-based snapshots of a [`Store`].
///
/// The last successful save time and the filename sequence counter are the
/// only state. The timestamp is advanced only when a save succeeds, so a
/// failing disk keeps the manager retrying on later command boundaries.
#[derive(Debug)]
pub struct SnapshotManager {
    /// Directory snapshots are written into
    dir: PathBuf,

    /// Minimum elapsed time between automatic backups
    interval: Duration,

    /// When the last successful save finished.
    ///
    /// Also serializes check-and-save across sessions, so concurrent
    /// commands trigger at most one snapshot per interval.
    last_saved: Mutex<Instant>,

    /// Sequence counter folded into filenames; disambiguates saves that
    /// land within the same second
    seq: AtomicU64,
}

impl SnapshotManager {
    /// Creates a manager writing into `dir` with the given auto-backup
    /// interval.
    ///
    /// The interval clock starts now: the first auto-backup happens one
    /// full interval after startup, not immediately.
    pub fn new(dir: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            interval,
            last_saved: Mutex::new(Instant::now()),
            seq: AtomicU64::new(0),
        }
    }

    /// Creates a manager with the default 5 minute interval.
    pub fn with_default_interval(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, DEFAULT_BACKUP_INTERVAL)
    }

    /// The directory snapshots are written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves a snapshot of the store, returning the path written.
    ///
    /// Failure leaves the in-memory store untouched and the last-save
    /// timestamp unadvanced; the caller decides how to surface the error
    /// (the BACKUP command turns it into an error reply).
    pub fn save(&self, store: &Store) -> Result<PathBuf, SnapshotError> {
        let mut last_saved = self.last_saved.lock().unwrap();
        let path = self.write_snapshot(store)?;
        *last_saved = Instant::now();
        Ok(path)
    }

    /// Runs the auto-backup check; called after every dispatched command.
    ///
    /// Saves once if the interval has elapsed since the last successful
    /// save and the store is non-empty. The check only runs on command
    /// boundaries, so an idle server never auto-backs-up. Failures are
    /// logged and swallowed here; the next command boundary retries.
    pub fn check_auto_backup(&self, store: &Store) {
        let mut last_saved = self.last_saved.lock().unwrap();
        if last_saved.elapsed() <= self.interval || store.is_empty() {
            return;
        }

        match self.write_snapshot(store) {
            Ok(path) => {
                *last_saved = Instant::now();
                info!(path = %path.display(), "Automatic backup saved");
            }
            Err(e) => {
                warn!(error = %e, "Automatic backup failed");
            }
        }
    }

    /// Writes a point-in-time copy of the store to a fresh snapshot file.
    fn write_snapshot(&self, store: &Store) -> Result<PathBuf, SnapshotError> {
        let pairs = store.pairs();
        let path = self.dir.join(self.next_filename());
        if path.exists() {
            return Err(SnapshotError::AlreadyExists(path));
        }

        let tmp_path = path.with_extension("tmp");
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "{}", pairs.len())?;
        for (key, value) in &pairs {
            writeln!(writer, "{}", key.len())?;
            writer.write_all(key)?;
            writer.write_all(b"\n")?;
            writeln!(writer, "{}", value.len())?;
            writer.write_all(value)?;
            writer.write_all(b"\n")?;
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp_path, &path)?;

        info!(
            path = %path.display(),
            pairs = pairs.len(),
            "Snapshot written"
        );
        Ok(path)
    }

    /// Builds the next snapshot filename:
    /// `snapshot-<YYYYmmdd-HHMMSS>-<seq>.db` in local time.
    fn next_filename(&self) -> String {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}{}-{}{}", SNAPSHOT_PREFIX, stamp, seq, SNAPSHOT_SUFFIX)
    }
}

/// Parses a snapshot file back into (key, value) pairs.
///
/// Used by the `--restore` startup flag and by tests to verify round-trips.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<Vec<(Vec<u8>, Vec<u8>)>, SnapshotError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let count = read_length_record(&mut reader)?;
    let mut pairs = Vec::with_capacity(count);

    for _ in 0..count {
        let key = read_sized_record(&mut reader)?;
        let value = read_sized_record(&mut reader)?;
        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Reads a decimal length line terminated by `\n`.
fn read_length_record(reader: &mut impl BufRead) -> Result<usize, SnapshotError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line)?;
    if n == 0 {
        return Err(SnapshotError::Corrupt("unexpected end of file".into()));
    }
    line.trim_end_matches('\n')
        .parse()
        .map_err(|_| SnapshotError::Corrupt(format!("invalid length line: {:?}", line)))
}

/// Reads a length line followed by exactly that many payload bytes and a
/// trailing `\n`.
fn read_sized_record(reader: &mut impl BufRead) -> Result<Vec<u8>, SnapshotError> {
    let len = read_length_record(reader)?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;

    let mut newline = [0u8; 1];
    reader.read_exact(&mut newline)?;
    if newline[0] != b'\n' {
        return Err(SnapshotError::Corrupt(
            "payload not terminated by newline".into(),
        ));
    }

    Ok(payload)
}
