//! Startup: create or reload the tree and rebuild the volatile mirror.

use std::collections::HashSet;

use kvfs_store::{StoreError, TieredStore};
use kvfs_types::mode::{S_IROTH, S_IRWXG, S_IRWXU};
use kvfs_types::{Fcb, FileKind, ObjectId, StoreKey};
use serde::Serialize;
use tracing::{debug, info};

use crate::caller::Caller;
use crate::error::{FsError, FsResult};

/// Permission bits of a freshly initialized root.
pub const ROOT_PERM: u32 = S_IRWXU | S_IRWXG | S_IROTH;

/// What recovery found.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// A new, empty root was created.
    pub initialized: bool,
    pub directories: u64,
    pub files: u64,
    /// Records copied into the mirror, the root included.
    pub records_mirrored: u64,
}

/// Load the root from the durable tier, or create it, and copy every
/// reachable record into the mirror.
///
/// The walk uses an explicit stack, so tree depth is bounded only by memory.
/// A key reached twice means the stored tree is not a tree and fails with
/// `Corrupt`. A record or blob that an entry references but the durable
/// tier lacks is a storage error. Either way the filesystem cannot start.
pub fn recover(store: &TieredStore, caller: &Caller) -> FsResult<RecoveryReport> {
    let Some(root) = store.load_durable_record(&StoreKey::Root)? else {
        let root = Fcb::new(FileKind::Directory, ROOT_PERM, caller.uid, caller.gid);
        store.put_record(&StoreKey::Root, &root)?;
        info!(uid = caller.uid, gid = caller.gid, "initialized empty filesystem");
        return Ok(RecoveryReport {
            initialized: true,
            directories: 1,
            records_mirrored: 1,
            ..RecoveryReport::default()
        });
    };

    let mut report = RecoveryReport::default();
    store.mirror_record(&StoreKey::Root, &root)?;
    report.records_mirrored += 1;

    let mut visited: HashSet<ObjectId> = HashSet::new();
    let mut stack = vec![root];

    while let Some(fcb) = stack.pop() {
        if !fcb.is_dir() {
            report.files += 1;
            continue;
        }
        report.directories += 1;
        if !fcb.has_content() {
            continue;
        }

        let dir = store.directory_of(&fcb)?;
        for entry in dir.entries() {
            if !visited.insert(entry.child) {
                return Err(FsError::Corrupt(format!(
                    "record {} is reachable more than once (entry {:?})",
                    entry.child, entry.name
                )));
            }
            let key = StoreKey::Object(entry.child);
            let child = store
                .load_durable_record(&key)?
                .ok_or(StoreError::MissingRecord(key))?;
            store.mirror_record(&key, &child)?;
            report.records_mirrored += 1;
            debug!(name = %entry.name, key = %key, "mirrored record");
            stack.push(child);
        }
    }

    info!(
        directories = report.directories,
        files = report.files,
        records = report.records_mirrored,
        "recovered filesystem from durable log"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kvfs_store::{InMemoryKvStore, KvStore};
    use kvfs_types::{DirEntry, DirectoryBlob};

    fn fresh() -> (Arc<InMemoryKvStore>, TieredStore) {
        let durable = Arc::new(InMemoryKvStore::new());
        let store = TieredStore::new(Arc::new(InMemoryKvStore::new()), durable.clone());
        (durable, store)
    }

    /// A store sharing `durable` with an empty mirror, as after a restart.
    fn restarted(durable: &Arc<InMemoryKvStore>) -> (Arc<InMemoryKvStore>, TieredStore) {
        let mirror = Arc::new(InMemoryKvStore::new());
        let store = TieredStore::new(mirror.clone(), durable.clone());
        (mirror, store)
    }

    fn link(store: &TieredStore, parent_key: StoreKey, child: &Fcb, name: &str) -> StoreKey {
        let mut parent = store.load_durable_record(&parent_key).unwrap().unwrap();
        let mut dir = store.directory_of(&parent).unwrap();
        let id = ObjectId::generate();
        dir.push(DirEntry::new(id, name)).unwrap();
        parent.size = store.store_directory(&parent, &dir).unwrap();
        store.put_record(&parent_key, &parent).unwrap();
        let key = StoreKey::Object(id);
        store.put_record(&key, child).unwrap();
        key
    }

    #[test]
    fn initializes_root_when_absent() {
        let (durable, store) = fresh();
        let report = recover(&store, &Caller::new(1000, 100)).unwrap();
        assert!(report.initialized);

        let root = store.require_record(&StoreKey::Root).unwrap();
        assert!(root.is_dir());
        assert_eq!(root.perm(), 0o774);
        assert_eq!((root.uid, root.gid, root.size), (1000, 100, 0));
        assert!(durable.contains(b"root").unwrap());
    }

    #[test]
    fn rebuilds_mirror_from_durable() {
        let (durable, store) = fresh();
        recover(&store, &Caller::ROOT).unwrap();
        let a = link(&store, StoreKey::Root, &Fcb::new(FileKind::Directory, 0o755, 0, 0), "a");
        let f = link(&store, a, &Fcb::new(FileKind::Regular, 0o644, 0, 0), "f");
        link(&store, StoreKey::Root, &Fcb::new(FileKind::Regular, 0o600, 0, 0), "g");

        let (mirror, again) = restarted(&durable);
        assert!(mirror.is_empty());
        let report = recover(&again, &Caller::ROOT).unwrap();
        assert!(!report.initialized);
        assert_eq!(report.directories, 2);
        assert_eq!(report.files, 2);
        assert_eq!(report.records_mirrored, 4);
        assert_eq!(mirror.len(), 4);
        assert_eq!(
            again.get_record(&f).unwrap(),
            store.get_record(&f).unwrap()
        );
    }

    #[test]
    fn missing_child_record_is_fatal() {
        let (durable, store) = fresh();
        recover(&store, &Caller::ROOT).unwrap();
        let a = link(&store, StoreKey::Root, &Fcb::new(FileKind::Regular, 0o644, 0, 0), "a");
        durable.delete(a.as_bytes()).unwrap();

        let (_mirror, again) = restarted(&durable);
        let err = recover(&again, &Caller::ROOT).unwrap_err();
        assert!(matches!(err, FsError::Storage(StoreError::MissingRecord(k)) if k == a));
    }

    #[test]
    fn missing_directory_blob_is_fatal() {
        let (durable, store) = fresh();
        recover(&store, &Caller::ROOT).unwrap();
        link(&store, StoreKey::Root, &Fcb::new(FileKind::Regular, 0o644, 0, 0), "a");
        let root = store.require_record(&StoreKey::Root).unwrap();
        durable.delete(root.content.as_bytes()).unwrap();

        let (_mirror, again) = restarted(&durable);
        assert!(matches!(
            recover(&again, &Caller::ROOT),
            Err(FsError::Storage(StoreError::MissingContent(_)))
        ));
    }

    #[test]
    fn cycle_is_corrupt() {
        let (durable, store) = fresh();
        recover(&store, &Caller::ROOT).unwrap();
        let a = link(&store, StoreKey::Root, &Fcb::new(FileKind::Directory, 0o755, 0, 0), "a");
        let StoreKey::Object(a_id) = a else {
            unreachable!()
        };

        // Make `a` list itself.
        let mut a_fcb = store.require_record(&a).unwrap();
        let mut dir = DirectoryBlob::new();
        dir.push(DirEntry::new(a_id, "self")).unwrap();
        a_fcb.size = store.store_directory(&a_fcb, &dir).unwrap();
        store.put_record(&a, &a_fcb).unwrap();

        let (_mirror, again) = restarted(&durable);
        assert!(matches!(
            recover(&again, &Caller::ROOT),
            Err(FsError::Corrupt(_))
        ));
    }
}
