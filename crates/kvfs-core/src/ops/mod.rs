//! Operation handlers.
//!
//! Each handler is a method on [`Filesystem`] that takes the caller and a
//! path, resolves it under the appropriate lock, and reads or mutates the
//! records it finds. Multi-step mutations write the parent directory first
//! and the child record second; there is no rollback if the second step
//! fails.

mod attr;
mod dir;
mod file;
mod rename;

use kvfs_types::{DirEntry, Fcb, FileKind, ObjectId, StoreKey};
use tracing::debug;

use crate::attr::FileAttr;
use crate::caller::Caller;
use crate::error::{FsError, FsResult};
use crate::filesystem::{commit_directory, insert_entry, take_entry, Filesystem};
use crate::path::{normalize, split_parent, validate_leaf};
use crate::permission::{require, AccessMode};
use crate::resolve::{resolve, resolve_dir};

impl Filesystem {
    /// Create a new, empty file or directory at `path`.
    fn make_node(
        &self,
        caller: &Caller,
        path: &str,
        kind: FileKind,
        perm: u32,
    ) -> FsResult<FileAttr> {
        let (parent_path, name) = split_parent(path)?;
        validate_leaf(name)?;

        let store = self.write_store()?;
        let mut parent = resolve_dir(&store, caller, &parent_path)?;
        require(&parent.fcb, caller, AccessMode::Write, &parent_path)?;

        let id = ObjectId::generate();
        let mut entries = store.directory_of(&parent.fcb)?;
        insert_entry(
            &mut entries,
            DirEntry::new(id, name),
            self.config().reject_duplicate_names,
            &normalize(path),
        )?;
        commit_directory(&store, &mut parent, &entries)?;

        let fcb = Fcb::new(kind, perm, caller.uid, caller.gid);
        store.put_record(&StoreKey::Object(id), &fcb)?;
        debug!(path, kind = %kind, mode = fcb.mode, "created");
        Ok(FileAttr::from(&fcb))
    }

    /// Remove the file or empty directory at `path`.
    fn remove_node(&self, caller: &Caller, path: &str, kind: FileKind) -> FsResult<()> {
        let (parent_path, name) = split_parent(path)?;

        let store = self.write_store()?;
        let mut parent = resolve_dir(&store, caller, &parent_path)?;
        require(&parent.fcb, caller, AccessMode::Write, &parent_path)?;

        let target = resolve(&store, caller, path)?;
        match kind {
            FileKind::Regular if target.fcb.is_dir() => {
                return Err(FsError::IsADirectory(path.to_string()));
            }
            FileKind::Directory if !target.fcb.is_dir() => {
                return Err(FsError::NotADirectory(path.to_string()));
            }
            FileKind::Directory if target.fcb.has_content() => {
                return Err(FsError::DirectoryNotEmpty(path.to_string()));
            }
            _ => {}
        }

        let mut entries = store.directory_of(&parent.fcb)?;
        take_entry(&mut entries, &parent_path, name)?;

        store.delete_record(&target.key)?;
        if target.fcb.has_content() {
            store.delete_content(&target.fcb.content)?;
        }
        commit_directory(&store, &mut parent, &entries)?;
        debug!(path, kind = %kind, "removed");
        Ok(())
    }
}
