use crate::error::StoreResult;

/// Byte-keyed key-value store.
///
/// All implementations must satisfy these invariants:
/// - `put` replaces any previous value under the same key.
/// - A successful `put` or `delete` is visible to the next `get` on the same
///   store, from any thread.
/// - The store never interprets keys or values.
/// - All I/O errors are propagated, never silently ignored.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`.
    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Delete `key`. Returns `true` if it existed.
    fn delete(&self, key: &[u8]) -> StoreResult<bool>;

    /// Check whether a key exists.
    ///
    /// Default implementation calls `get()`. Backends with an index should
    /// override it.
    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Make every acknowledged write durable. A no-op for volatile stores.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}
