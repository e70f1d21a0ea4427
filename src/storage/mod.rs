//! Storage Module
//!
//! The process-wide key-value mapping. A single `Store` is created at
//! startup, wrapped in an `Arc`, and shared by every session; all store
//! mutation happens inside command dispatch.
//!
//! ## Example
//!
//! ```
//! use cachedb::storage::Store;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::new());
//! store.set(Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
//! ```

pub mod engine;

// Re-export the store type
pub use engine::Store;
