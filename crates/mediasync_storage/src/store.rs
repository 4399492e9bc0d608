//! Key-value store trait definition.

use crate::error::StorageResult;

/// A durable key-value store holding one JSON document per key.
///
/// # Invariants
///
/// - `get` on a key that was never written returns `Ok(None)`
/// - `put` replaces the whole value; there is no append or versioning
/// - `delete` of a missing key succeeds
/// - Stores must be `Send + Sync`; the gateway calls them from many
///   blocking tasks at once
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written durably.
    fn put(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be modified.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lists stored keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the key index cannot be read.
    fn keys(&self) -> StorageResult<Vec<String>>;
}
