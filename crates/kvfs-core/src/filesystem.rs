use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use kvfs_store::{InMemoryKvStore, KvStore, LogConfig, LogKvStore, TieredStore};
use kvfs_types::{now_secs, DirEntry, DirectoryBlob, TypeError};
use tracing::{debug, info};

use crate::caller::Caller;
use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::recovery::{recover, RecoveryReport};
use crate::resolve::Resolved;

/// A mounted filesystem.
///
/// Owns both storage tiers. Every operation takes the caller's identity
/// explicitly and runs its whole resolve-then-act sequence under one guard:
/// shared for reads, exclusive for mutations.
pub struct Filesystem {
    store: RwLock<TieredStore>,
    log: Option<Arc<LogKvStore>>,
    config: FsConfig,
    recovery: RecoveryReport,
}

impl Filesystem {
    /// Open the durable log named by `config` and bootstrap from it.
    pub fn mount(config: FsConfig, caller: Caller) -> FsResult<Self> {
        let log_config = LogConfig {
            sync_mode: config.sync,
        };
        let log = Arc::new(LogKvStore::open(&config.log_path(), log_config)?);
        let mirror = Arc::new(InMemoryKvStore::new());
        let mut fs = Self::bootstrap(mirror, log.clone(), caller, config)?;
        fs.log = Some(log);
        Ok(fs)
    }

    /// Bootstrap over arbitrary tiers. `caller` owns the root if one has to
    /// be created.
    pub fn bootstrap(
        mirror: Arc<dyn KvStore>,
        durable: Arc<dyn KvStore>,
        caller: Caller,
        config: FsConfig,
    ) -> FsResult<Self> {
        let store = TieredStore::new(mirror, durable);
        let recovery = recover(&store, &caller)?;
        Ok(Self {
            store: RwLock::new(store),
            log: None,
            config,
            recovery,
        })
    }

    /// Flush both tiers and release the filesystem.
    pub fn close(self) -> FsResult<()> {
        self.read_store()?.flush()?;
        info!("filesystem closed");
        Ok(())
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// What bootstrap found.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Rewrite the durable log without dead records. Returns the bytes
    /// reclaimed; 0 when the durable tier is not a log file.
    pub fn compact(&self) -> FsResult<u64> {
        let _guard = self.write_store()?;
        match &self.log {
            Some(log) => Ok(log.compact()?),
            None => Ok(0),
        }
    }

    pub(crate) fn read_store(&self) -> FsResult<RwLockReadGuard<'_, TieredStore>> {
        self.store.read().map_err(|_| FsError::LockPoisoned)
    }

    pub(crate) fn write_store(&self) -> FsResult<RwLockWriteGuard<'_, TieredStore>> {
        self.store.write().map_err(|_| FsError::LockPoisoned)
    }
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("config", &self.config)
            .field("recovery", &self.recovery)
            .finish_non_exhaustive()
    }
}

// ── Directory entry maintenance ─────────────────────────────────────

/// Add an entry to `parent`'s blob, failing with `AlreadyExists` on a name
/// clash when `reject_duplicates` is set.
pub(crate) fn insert_entry(
    dir: &mut DirectoryBlob,
    entry: DirEntry,
    reject_duplicates: bool,
    path: &str,
) -> FsResult<()> {
    if reject_duplicates && dir.find(&entry.name).is_some() {
        return Err(FsError::AlreadyExists(path.to_string()));
    }
    dir.push(entry).map_err(invalid_name)
}

/// Remove `name` from `dir`. Its absence after a successful resolution is
/// an internal inconsistency.
pub(crate) fn take_entry(
    dir: &mut DirectoryBlob,
    parent_path: &str,
    name: &str,
) -> FsResult<DirEntry> {
    dir.remove(name)
        .ok_or_else(|| FsError::InternalInconsistency {
            parent: parent_path.to_string(),
            name: name.to_string(),
        })
}

/// Persist `dir` as `parent`'s content, then `parent`'s record with its
/// new size and bumped modification times.
pub(crate) fn commit_directory(
    store: &TieredStore,
    parent: &mut Resolved,
    dir: &DirectoryBlob,
) -> FsResult<()> {
    parent.fcb.size = store.store_directory(&parent.fcb, dir)?;
    let now = now_secs();
    parent.fcb.mtime = now;
    parent.fcb.ctime = now;
    store.put_record(&parent.key, &parent.fcb)?;
    debug!(key = %parent.key, entries = dir.len(), "directory updated");
    Ok(())
}

pub(crate) fn invalid_name(e: TypeError) -> FsError {
    FsError::InvalidArgument(e.to_string())
}
