//! # MediaSync Storage
//!
//! Key-value store abstraction behind the MediaSync gateway.
//!
//! The store is a single flat namespace mapping string keys to JSON text.
//! Stores do not interpret the values they hold and provide no transactions
//! across keys; each `put` replaces a whole key.
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral servers
//! - [`FileStore`] - One file per key under a data directory
//!
//! ## Example
//!
//! ```rust
//! use mediasync_storage::{KvStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.put("filmin_catalog_paid", "[]").unwrap();
//! assert_eq!(store.get("filmin_catalog_paid").unwrap().as_deref(), Some("[]"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KvStore;
