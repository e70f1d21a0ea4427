//! In-Memory Key-Value Store
//!
//! A `RwLock`-guarded HashMap shared by every connection. The lock is the
//! explicit concurrency discipline that replaces implicit single-threaded
//! safety: each command mutates the store under the write lock, so every
//! command remains atomic with respect to the store even with one task per
//! connection.
//!
//! A single lock (rather than sharding) also gives `pairs()` a trivially
//! consistent point-in-time view, which is what the snapshot writer needs.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// The process-wide key-value mapping.
///
/// Keys are unique; `set` overwrites. Values are binary-safe `Bytes`.
/// Designed to be wrapped in an `Arc` and shared across session tasks.
///
/// # Example
///
/// ```
/// use cachedb::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
/// store.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
/// assert_eq!(store.get(b"missing"), None);
/// ```
pub struct Store {
    /// The guarded mapping
    data: RwLock<HashMap<Bytes, Bytes>>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
        }
    }

    /// Gets the value for a key, or `None` if the key is absent.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.data.read().unwrap().get(key).cloned()
    }

    /// Sets a key-value pair, overwriting any previous value.
    ///
    /// Returns `true` if a new key was created, `false` on overwrite.
    pub fn set(&self, key: Bytes, value: Bytes) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.data.write().unwrap().insert(key, value).is_none()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.data.read().unwrap().len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.read().unwrap().is_empty()
    }

    /// Returns a point-in-time copy of every (key, value) pair.
    ///
    /// The copy is taken under the read lock, so it is an atomic view of
    /// the store; order is unspecified. This is what the snapshot writer
    /// serializes.
    pub fn pairs(&self) -> Vec<(Bytes, Bytes)> {
        self.data
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Total GET operations served.
    pub fn gets(&self) -> u64 {
        self.get_count.load(Ordering::Relaxed)
    }

    /// Total SET operations served.
    pub fn sets(&self) -> u64 {
        self.set_count.load(Ordering::Relaxed)
    }
}
