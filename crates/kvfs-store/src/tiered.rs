use std::sync::Arc;

use kvfs_types::{DirectoryBlob, Fcb, ObjectId, StoreKey};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::KvStore;

/// The two storage tiers with the record/content discipline applied.
///
/// Metadata records are read from the mirror and written through to both
/// tiers, mirror first. Content blobs only ever touch the durable tier. The
/// root record goes through the same calls as every other record, under
/// [`StoreKey::Root`].
#[derive(Clone)]
pub struct TieredStore {
    mirror: Arc<dyn KvStore>,
    durable: Arc<dyn KvStore>,
}

impl TieredStore {
    pub fn new(mirror: Arc<dyn KvStore>, durable: Arc<dyn KvStore>) -> Self {
        Self { mirror, durable }
    }

    // ── Metadata records ────────────────────────────────────────────

    /// Read a record from the mirror.
    pub fn get_record(&self, key: &StoreKey) -> StoreResult<Option<Fcb>> {
        match self.mirror.get(key.as_bytes())? {
            Some(bytes) => decode_record(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Read a record from the mirror, treating absence as an error.
    ///
    /// Used wherever a directory entry already vouched for the key.
    pub fn require_record(&self, key: &StoreKey) -> StoreResult<Fcb> {
        self.get_record(key)?
            .ok_or(StoreError::MissingRecord(*key))
    }

    /// Write a record to the mirror, then to the durable tier.
    pub fn put_record(&self, key: &StoreKey, fcb: &Fcb) -> StoreResult<()> {
        let bytes = encode_record(key, fcb)?;
        self.mirror.put(key.as_bytes(), &bytes)?;
        self.durable.put(key.as_bytes(), &bytes)?;
        debug!(key = %key, size = fcb.size, "record stored");
        Ok(())
    }

    /// Delete a record from the mirror, then from the durable tier.
    pub fn delete_record(&self, key: &StoreKey) -> StoreResult<()> {
        self.mirror.delete(key.as_bytes())?;
        self.durable.delete(key.as_bytes())?;
        debug!(key = %key, "record deleted");
        Ok(())
    }

    /// Read a record straight from the durable tier. Used by recovery.
    pub fn load_durable_record(&self, key: &StoreKey) -> StoreResult<Option<Fcb>> {
        match self.durable.get(key.as_bytes())? {
            Some(bytes) => decode_record(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Place a record in the mirror only. Used by recovery.
    pub fn mirror_record(&self, key: &StoreKey, fcb: &Fcb) -> StoreResult<()> {
        let bytes = encode_record(key, fcb)?;
        self.mirror.put(key.as_bytes(), &bytes)
    }

    // ── Content blobs ───────────────────────────────────────────────

    /// Raw blob under `id`, if any.
    pub fn get_content(&self, id: &ObjectId) -> StoreResult<Option<Vec<u8>>> {
        self.durable.get(id.as_bytes())
    }

    pub fn put_content(&self, id: &ObjectId, bytes: &[u8]) -> StoreResult<()> {
        self.durable.put(id.as_bytes(), bytes)?;
        debug!(content = %id.short_hex(), len = bytes.len(), "content stored");
        Ok(())
    }

    pub fn delete_content(&self, id: &ObjectId) -> StoreResult<bool> {
        self.durable.delete(id.as_bytes())
    }

    /// Content of a record. A record of size 0 has no blob and yields an
    /// empty buffer without touching the store.
    pub fn content_of(&self, fcb: &Fcb) -> StoreResult<Vec<u8>> {
        if !fcb.has_content() {
            return Ok(Vec::new());
        }
        self.get_content(&fcb.content)?
            .ok_or(StoreError::MissingContent(fcb.content))
    }

    /// Decoded entry list of a directory record.
    pub fn directory_of(&self, fcb: &Fcb) -> StoreResult<DirectoryBlob> {
        let bytes = self.content_of(fcb)?;
        DirectoryBlob::decode(&bytes).map_err(|source| StoreError::Corrupt {
            key: fcb.content.to_hex(),
            source,
        })
    }

    /// Store a directory's entries and return the new size for its record.
    ///
    /// An empty directory has its blob deleted rather than stored at zero
    /// length.
    pub fn store_directory(&self, fcb: &Fcb, dir: &DirectoryBlob) -> StoreResult<u64> {
        if dir.is_empty() {
            self.delete_content(&fcb.content)?;
            return Ok(0);
        }
        let bytes = dir.encode().map_err(|source| StoreError::Corrupt {
            key: fcb.content.to_hex(),
            source,
        })?;
        self.put_content(&fcb.content, &bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Sync both tiers.
    pub fn flush(&self) -> StoreResult<()> {
        self.mirror.flush()?;
        self.durable.flush()
    }
}

impl std::fmt::Debug for TieredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStore").finish_non_exhaustive()
    }
}

fn encode_record(key: &StoreKey, fcb: &Fcb) -> StoreResult<Vec<u8>> {
    fcb.encode().map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

fn decode_record(key: &StoreKey, bytes: &[u8]) -> StoreResult<Fcb> {
    Fcb::decode(bytes).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}
