use kvfs_types::DirEntry;
use tracing::debug;

use crate::caller::Caller;
use crate::error::{FsError, FsResult};
use crate::filesystem::{commit_directory, insert_entry, invalid_name, take_entry, Filesystem};
use crate::path::{is_within, normalize, split_parent, validate_leaf};
use crate::permission::{require, AccessMode};
use crate::resolve::{exists, resolve, resolve_dir};

impl Filesystem {
    /// Move or rename `old` to `new`.
    ///
    /// `new` must not exist. Both parent directories must be writable. A
    /// rename within one directory rewrites the entry's name in place;
    /// otherwise the entry moves from the old parent to the new one, keeping
    /// the child's key.
    pub fn rename(&self, caller: &Caller, old: &str, new: &str) -> FsResult<()> {
        debug!(old, new, "rename");
        if normalize(old) == normalize(new) {
            return Ok(());
        }

        let store = self.write_store()?;
        let moving = resolve(&store, caller, old)?;
        if exists(&store, caller, new)? {
            return Err(FsError::AlreadyExists(new.to_string()));
        }

        let (old_parent_path, old_name) = split_parent(old)?;
        let (new_parent_path, new_name) = split_parent(new)?;
        validate_leaf(new_name)?;
        if moving.fcb.is_dir() && is_within(new, old) {
            return Err(FsError::InvalidArgument(format!(
                "cannot move {old} beneath itself"
            )));
        }

        let mut old_parent = resolve_dir(&store, caller, &old_parent_path)?;
        require(&old_parent.fcb, caller, AccessMode::Write, &old_parent_path)?;
        let mut new_parent = resolve_dir(&store, caller, &new_parent_path)?;
        require(&new_parent.fcb, caller, AccessMode::Write, &new_parent_path)?;

        let reject_duplicates = self.config().reject_duplicate_names;
        if old_parent.key == new_parent.key {
            let mut entries = store.directory_of(&old_parent.fcb)?;
            if reject_duplicates && entries.find(new_name).is_some() {
                return Err(FsError::AlreadyExists(new.to_string()));
            }
            if !entries
                .rename_in_place(old_name, new_name)
                .map_err(invalid_name)?
            {
                return Err(FsError::InternalInconsistency {
                    parent: old_parent_path,
                    name: old_name.to_string(),
                });
            }
            commit_directory(&store, &mut old_parent, &entries)?;
        } else {
            let mut old_entries = store.directory_of(&old_parent.fcb)?;
            let entry = take_entry(&mut old_entries, &old_parent_path, old_name)?;
            let mut new_entries = store.directory_of(&new_parent.fcb)?;
            insert_entry(
                &mut new_entries,
                DirEntry::new(entry.child, new_name),
                reject_duplicates,
                new,
            )?;
            commit_directory(&store, &mut old_parent, &old_entries)?;
            commit_directory(&store, &mut new_parent, &new_entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::FsError;
    use crate::ops::testing::{fs, MEMBER, OWNER};
    use kvfs_types::DIRENT_SIZE;

    #[test]
    fn rename_to_itself_is_noop() {
        let fs = fs();
        fs.create(&OWNER, "/a", 0o644).unwrap();
        let before = fs.getattr(&OWNER, "/").unwrap();
        fs.rename(&OWNER, "/a", "/a").unwrap();
        assert_eq!(fs.getattr(&OWNER, "/").unwrap(), before);
        // Nothing is even resolved.
        fs.rename(&OWNER, "/missing", "/missing").unwrap();
    }

    #[test]
    fn rename_onto_existing_fails_untouched() {
        let fs = fs();
        fs.create(&OWNER, "/a", 0o644).unwrap();
        fs.create(&OWNER, "/b", 0o600).unwrap();
        fs.write(&OWNER, "/a", b"aaa", 0).unwrap();
        fs.write(&OWNER, "/b", b"b", 0).unwrap();

        let err = fs.rename(&OWNER, "/a", "/b").unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
        assert_eq!(fs.read(&OWNER, "/a", 10, 0).unwrap(), b"aaa");
        assert_eq!(fs.read(&OWNER, "/b", 10, 0).unwrap(), b"b");
        assert_eq!(fs.getattr(&OWNER, "/b").unwrap().perm(), 0o600);
    }

    #[test]
    fn rename_missing_source() {
        let fs = fs();
        assert!(matches!(fs.rename(&OWNER, "/x", "/y"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn rename_within_directory() {
        let fs = fs();
        fs.mkdir(&OWNER, "/d", 0o755).unwrap();
        fs.create(&OWNER, "/d/x", 0o644).unwrap();
        fs.write(&OWNER, "/d/x", b"payload", 0).unwrap();

        fs.rename(&OWNER, "/d/x", "/d//y").unwrap();
        assert!(matches!(fs.getattr(&OWNER, "/d/x"), Err(FsError::NotFound(_))));
        assert_eq!(fs.read(&OWNER, "/d/y", 64, 0).unwrap(), b"payload");
        assert_eq!(fs.getattr(&OWNER, "/d").unwrap().size, DIRENT_SIZE as u64);
    }

    #[test]
    fn move_directory_between_parents() {
        let fs = fs();
        fs.mkdir(&OWNER, "/src", 0o755).unwrap();
        fs.mkdir(&OWNER, "/dst", 0o755).unwrap();
        fs.mkdir(&OWNER, "/src/tree", 0o755).unwrap();
        fs.create(&OWNER, "/src/tree/leaf", 0o644).unwrap();
        fs.write(&OWNER, "/src/tree/leaf", b"green", 0).unwrap();

        fs.rename(&OWNER, "/src/tree", "/dst/moved").unwrap();
        assert_eq!(fs.getattr(&OWNER, "/src").unwrap().size, 0);
        assert_eq!(fs.getattr(&OWNER, "/dst").unwrap().size, DIRENT_SIZE as u64);
        assert_eq!(fs.read(&OWNER, "/dst/moved/leaf", 64, 0).unwrap(), b"green");
        assert!(fs.verify().unwrap().is_clean());
    }

    #[test]
    fn directory_cannot_move_beneath_itself() {
        let fs = fs();
        fs.mkdir(&OWNER, "/a", 0o755).unwrap();
        fs.mkdir(&OWNER, "/a/b", 0o755).unwrap();
        let err = fs.rename(&OWNER, "/a", "/a/b/c").unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
        assert_eq!(err.errno(), libc::EINVAL);
    }

    #[test]
    fn both_parents_must_be_writable() {
        let fs = fs();
        fs.mkdir(&OWNER, "/locked", 0o755).unwrap();
        fs.mkdir(&OWNER, "/open", 0o777).unwrap();
        fs.create(&OWNER, "/locked/f", 0o666).unwrap();
        fs.create(&OWNER, "/open/g", 0o666).unwrap();

        assert!(matches!(
            fs.rename(&MEMBER, "/locked/f", "/open/f"),
            Err(FsError::PermissionDenied(p)) if p == "/locked"
        ));
        assert!(matches!(
            fs.rename(&MEMBER, "/open/g", "/locked/g"),
            Err(FsError::PermissionDenied(p)) if p == "/locked"
        ));
        fs.rename(&MEMBER, "/open/g", "/open/h").unwrap();
        // Nothing moved by the failed attempts.
        assert!(fs.getattr(&OWNER, "/locked/f").is_ok());
        assert!(fs.getattr(&OWNER, "/open/h").is_ok());
    }

    #[test]
    fn new_name_length_is_checked() {
        let fs = fs();
        fs.create(&OWNER, "/a", 0o644).unwrap();
        let long = format!("/{}", "n".repeat(256));
        assert!(matches!(fs.rename(&OWNER, "/a", &long), Err(FsError::NameTooLong(_))));
    }
}
