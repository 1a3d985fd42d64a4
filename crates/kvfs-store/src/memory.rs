use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::KvStore;

/// In-memory, HashMap-based key-value store.
///
/// Serves as the volatile mirror of metadata records. Tests also use it as a
/// stand-in durable tier, since it outlives any number of mirrors it is shared
/// with. Values are cloned on read and write.
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKvStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let map = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut map = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let mut map = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.remove(key).is_some())
    }

    fn contains(&self, key: &[u8]) -> StoreResult<bool> {
        let map = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKvStore")
            .field("key_count", &self.len())
            .finish()
    }
}
