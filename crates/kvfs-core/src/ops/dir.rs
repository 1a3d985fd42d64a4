use kvfs_types::{FileKind, StoreKey};
use tracing::debug;

use crate::attr::{FileAttr, Listing};
use crate::caller::Caller;
use crate::error::{FsError, FsResult};
use crate::filesystem::Filesystem;
use crate::permission::{require, AccessMode};
use crate::resolve::{resolve, Resolved};

impl Filesystem {
    /// Names in the directory at `path`, led by `.` and `..`.
    pub fn readdir(&self, caller: &Caller, path: &str) -> FsResult<Vec<String>> {
        debug!(path, "readdir");
        let store = self.read_store()?;
        let found = readable_dir(&store, caller, path)?;

        let mut names = vec![".".to_string(), "..".to_string()];
        let entries = store.directory_of(&found.fcb)?;
        names.extend(entries.entries().iter().map(|e| e.name.clone()));
        Ok(names)
    }

    /// Children of the directory at `path` with their attributes, in stored
    /// order. `.` and `..` are not included.
    pub fn list(&self, caller: &Caller, path: &str) -> FsResult<Vec<Listing>> {
        debug!(path, "list");
        let store = self.read_store()?;
        let found = readable_dir(&store, caller, path)?;

        let entries = store.directory_of(&found.fcb)?;
        entries
            .entries()
            .iter()
            .map(|entry| {
                let fcb = store.require_record(&StoreKey::Object(entry.child))?;
                Ok(Listing {
                    name: entry.name.clone(),
                    attr: FileAttr::from(&fcb),
                })
            })
            .collect()
    }

    /// Create an empty directory with permission bits `perm`.
    pub fn mkdir(&self, caller: &Caller, path: &str, perm: u32) -> FsResult<FileAttr> {
        debug!(path, perm, "mkdir");
        self.make_node(caller, path, FileKind::Directory, perm)
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, caller: &Caller, path: &str) -> FsResult<()> {
        debug!(path, "rmdir");
        self.remove_node(caller, path, FileKind::Directory)
    }
}

fn readable_dir(
    store: &kvfs_store::TieredStore,
    caller: &Caller,
    path: &str,
) -> FsResult<Resolved> {
    let found = resolve(store, caller, path)?;
    if !found.fcb.is_dir() {
        return Err(FsError::NotADirectory(path.to_string()));
    }
    require(&found.fcb, caller, AccessMode::Read, path)?;
    Ok(found)
}
