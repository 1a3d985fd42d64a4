//! Path resolution from the root record down the directory tree.

use kvfs_store::TieredStore;
use kvfs_types::{Fcb, StoreKey};
use tracing::trace;

use crate::caller::Caller;
use crate::error::{FsError, FsResult};
use crate::path::{components, join_components};
use crate::permission::{require, AccessMode};

/// A record found by path, with the key it is stored under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub key: StoreKey,
    pub fcb: Fcb,
}

/// Walk `path` from the root and return the record it names.
///
/// The root itself needs no permission. Any deeper lookup needs read
/// permission on the root and on every intermediate directory. An
/// intermediate that is a file fails with `NotADirectory`; a name missing
/// from its parent, or a parent without entries, fails with `NotFound`.
/// The final component may be of either kind.
pub fn resolve(store: &TieredStore, caller: &Caller, path: &str) -> FsResult<Resolved> {
    let root = store.require_record(&StoreKey::Root)?;
    let parts = components(path);
    if parts.is_empty() {
        return Ok(Resolved {
            key: StoreKey::Root,
            fcb: root,
        });
    }

    require(&root, caller, AccessMode::Read, "/")?;

    let last = parts.len() - 1;
    let mut current = root;
    for (depth, name) in parts.iter().enumerate() {
        let walked = || join_components(&parts[..=depth]);
        if !current.has_content() {
            return Err(FsError::NotFound(walked()));
        }
        let entries = store.directory_of(&current)?;
        let entry = entries
            .find(name)
            .ok_or_else(|| FsError::NotFound(walked()))?;
        let key = StoreKey::Object(entry.child);
        let fcb = store.require_record(&key)?;
        trace!(name = %name, key = %key, "resolved component");

        if depth == last {
            return Ok(Resolved { key, fcb });
        }
        if !fcb.is_dir() {
            return Err(FsError::NotADirectory(walked()));
        }
        require(&fcb, caller, AccessMode::Read, &walked())?;
        current = fcb;
    }

    Err(FsError::NotFound(path.to_string()))
}

/// Resolve `path` and require it to be a directory.
pub fn resolve_dir(store: &TieredStore, caller: &Caller, path: &str) -> FsResult<Resolved> {
    let found = resolve(store, caller, path)?;
    if !found.fcb.is_dir() {
        return Err(FsError::NotADirectory(path.to_string()));
    }
    Ok(found)
}

/// Whether `path` resolves to anything. Errors other than `NotFound`
/// propagate.
pub fn exists(store: &TieredStore, caller: &Caller, path: &str) -> FsResult<bool> {
    match resolve(store, caller, path) {
        Ok(_) => Ok(true),
        Err(FsError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}
