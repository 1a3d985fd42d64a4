use kvfs_types::{now_secs, FileKind, MAX_FILE_SIZE};
use tracing::debug;

use crate::attr::{FileAttr, OpenAccess};
use crate::caller::Caller;
use crate::error::{FsError, FsResult};
use crate::filesystem::Filesystem;
use crate::permission::{require, AccessMode};
use crate::resolve::resolve;

impl Filesystem {
    /// Check that `path` may be opened with `access`. No handle is kept;
    /// later reads and writes resolve the path again.
    pub fn open(&self, caller: &Caller, path: &str, access: OpenAccess) -> FsResult<()> {
        debug!(path, ?access, "open");
        let store = self.read_store()?;
        let found = resolve(&store, caller, path)?;
        if access.reads() {
            require(&found.fcb, caller, AccessMode::Read, path)?;
        }
        if access.writes() {
            require(&found.fcb, caller, AccessMode::Write, path)?;
            if found.fcb.is_dir() {
                return Err(FsError::IsADirectory(path.to_string()));
            }
        }
        Ok(())
    }

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// Reading at or past the end returns no bytes.
    pub fn read(
        &self,
        caller: &Caller,
        path: &str,
        size: usize,
        offset: u64,
    ) -> FsResult<Vec<u8>> {
        debug!(path, size, offset, "read");
        let store = self.read_store()?;
        let found = resolve(&store, caller, path)?;
        if found.fcb.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        require(&found.fcb, caller, AccessMode::Read, path)?;
        if offset >= found.fcb.size {
            return Ok(Vec::new());
        }

        let content = store.content_of(&found.fcb)?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
        let end = start.saturating_add(size).min(content.len());
        Ok(content[start..end].to_vec())
    }

    /// Write `data` at `offset` and return the number of bytes written.
    ///
    /// The file grows to `offset + data.len()` if that is past its end, with
    /// any gap zero-filled. Bytes outside the written range are kept.
    pub fn write(
        &self,
        caller: &Caller,
        path: &str,
        data: &[u8],
        offset: u64,
    ) -> FsResult<usize> {
        debug!(path, len = data.len(), offset, "write");
        let store = self.write_store()?;
        let mut found = resolve(&store, caller, path)?;
        if found.fcb.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        require(&found.fcb, caller, AccessMode::Write, path)?;
        if data.is_empty() {
            return Ok(0);
        }

        let end = offset.saturating_add(data.len() as u64);
        let new_size = found.fcb.size.max(end);
        if new_size > MAX_FILE_SIZE {
            return Err(FsError::FileTooBig {
                size: new_size,
                max: MAX_FILE_SIZE,
            });
        }

        let mut content = store.content_of(&found.fcb)?;
        content.resize(new_size as usize, 0);
        content[offset as usize..end as usize].copy_from_slice(data);
        store.put_content(&found.fcb.content, &content)?;

        found.fcb.size = new_size;
        found.fcb.touch_all(now_secs());
        store.put_record(&found.key, &found.fcb)?;
        Ok(data.len())
    }

    /// Resize a file. New bytes read as zero.
    pub fn truncate(&self, caller: &Caller, path: &str, size: u64) -> FsResult<()> {
        debug!(path, size, "truncate");
        let store = self.write_store()?;
        let mut found = resolve(&store, caller, path)?;
        if found.fcb.is_dir() {
            return Err(FsError::IsADirectory(path.to_string()));
        }
        require(&found.fcb, caller, AccessMode::Write, path)?;
        if size > MAX_FILE_SIZE {
            return Err(FsError::FileTooBig {
                size,
                max: MAX_FILE_SIZE,
            });
        }
        if size == found.fcb.size {
            return Ok(());
        }

        if size == 0 {
            store.delete_content(&found.fcb.content)?;
        } else {
            let mut content = store.content_of(&found.fcb)?;
            content.resize(size as usize, 0);
            store.put_content(&found.fcb.content, &content)?;
        }

        let now = now_secs();
        found.fcb.size = size;
        found.fcb.mtime = now;
        found.fcb.ctime = now;
        store.put_record(&found.key, &found.fcb)?;
        Ok(())
    }

    /// Create an empty regular file with permission bits `perm`.
    pub fn create(&self, caller: &Caller, path: &str, perm: u32) -> FsResult<FileAttr> {
        debug!(path, perm, "create");
        self.make_node(caller, path, FileKind::Regular, perm)
    }

    /// Remove a regular file.
    pub fn unlink(&self, caller: &Caller, path: &str) -> FsResult<()> {
        debug!(path, "unlink");
        self.remove_node(caller, path, FileKind::Regular)
    }

    /// Nothing is buffered, so there is nothing to flush.
    pub fn flush(&self, path: &str) -> FsResult<()> {
        debug!(path, "flush");
        Ok(())
    }

    pub fn release(&self, path: &str) -> FsResult<()> {
        debug!(path, "release");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::attr::OpenAccess;
    use crate::error::FsError;
    use crate::ops::testing::{fs, MEMBER, OWNER, STRANGER};
    use kvfs_types::{FileKind, MAX_FILE_SIZE};

    #[test]
    fn create_gives_empty_regular_file() {
        let fs = fs();
        let attr = fs.create(&OWNER, "/f", 0o640).unwrap();
        assert_eq!(attr.kind, FileKind::Regular);
        assert_eq!(attr.perm(), 0o640);
        assert_eq!(attr.size, 0);

        let got = fs.getattr(&OWNER, "/f").unwrap();
        assert_eq!(got.mode, kvfs_types::mode::S_IFREG | 0o640);
        assert_eq!((got.uid, got.gid, got.size), (1000, 100, 0));
    }

    #[test]
    fn write_then_read_round_trip() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        assert_eq!(fs.write(&OWNER, "/f", b"hello world", 0).unwrap(), 11);
        assert_eq!(fs.read(&OWNER, "/f", 11, 0).unwrap(), b"hello world");
        assert_eq!(fs.getattr(&OWNER, "/f").unwrap().size, 11);
    }

    #[test]
    fn read_clamps_to_end() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        fs.write(&OWNER, "/f", b"abcdef", 0).unwrap();
        assert_eq!(fs.read(&OWNER, "/f", 100, 4).unwrap(), b"ef");
        assert!(fs.read(&OWNER, "/f", 10, 6).unwrap().is_empty());
        assert!(fs.read(&OWNER, "/f", 10, 600).unwrap().is_empty());
    }

    #[test]
    fn read_of_empty_file_is_empty() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        assert!(fs.read(&OWNER, "/f", 10, 0).unwrap().is_empty());
    }

    #[test]
    fn overwrite_keeps_tail_and_gap_is_zeroed() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        fs.write(&OWNER, "/f", b"abcdef", 0).unwrap();
        fs.write(&OWNER, "/f", b"XY", 2).unwrap();
        assert_eq!(fs.read(&OWNER, "/f", 64, 0).unwrap(), b"abXYef");

        fs.write(&OWNER, "/f", b"Z", 8).unwrap();
        assert_eq!(fs.read(&OWNER, "/f", 64, 0).unwrap(), b"abXYef\0\0Z");
    }

    #[test]
    fn write_at_cap_fails_and_leaves_file_alone() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        fs.write(&OWNER, "/f", b"keep", 0).unwrap();
        let before = fs.getattr(&OWNER, "/f").unwrap();

        let err = fs.write(&OWNER, "/f", b"x", MAX_FILE_SIZE).unwrap_err();
        assert!(matches!(err, FsError::FileTooBig { size, .. } if size == MAX_FILE_SIZE + 1));
        assert_eq!(err.errno(), libc::EFBIG);
        assert_eq!(fs.getattr(&OWNER, "/f").unwrap(), before);
        assert_eq!(fs.read(&OWNER, "/f", 64, 0).unwrap(), b"keep");

        // One byte below the cap is fine.
        fs.write(&OWNER, "/f", b"x", MAX_FILE_SIZE - 1).unwrap();
        assert_eq!(fs.getattr(&OWNER, "/f").unwrap().size, MAX_FILE_SIZE);
    }

    #[test]
    fn write_needs_permission() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        assert!(matches!(
            fs.write(&MEMBER, "/f", b"x", 0),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(
            fs.read(&STRANGER, "/f", 1, 0),
            Ok(v) if v.is_empty()
        ));
    }

    #[test]
    fn directories_reject_file_io() {
        let fs = fs();
        fs.mkdir(&OWNER, "/d", 0o755).unwrap();
        assert!(matches!(fs.read(&OWNER, "/d", 1, 0), Err(FsError::IsADirectory(_))));
        assert!(matches!(fs.write(&OWNER, "/d", b"x", 0), Err(FsError::IsADirectory(_))));
        assert!(matches!(fs.truncate(&OWNER, "/d", 0), Err(FsError::IsADirectory(_))));
    }

    #[test]
    fn truncate_same_size_is_noop() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        fs.write(&OWNER, "/f", b"abc", 0).unwrap();
        let before = fs.getattr(&OWNER, "/f").unwrap();
        fs.truncate(&OWNER, "/f", 3).unwrap();
        assert_eq!(fs.getattr(&OWNER, "/f").unwrap(), before);
    }

    #[test]
    fn truncate_grow_reads_zeros() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        fs.write(&OWNER, "/f", b"abc", 0).unwrap();
        fs.truncate(&OWNER, "/f", 8).unwrap();
        assert_eq!(fs.getattr(&OWNER, "/f").unwrap().size, 8);
        assert_eq!(fs.read(&OWNER, "/f", 5, 3).unwrap(), vec![0u8; 5]);
        assert_eq!(fs.read(&OWNER, "/f", 3, 0).unwrap(), b"abc");

        // Growing an empty file.
        fs.create(&OWNER, "/g", 0o644).unwrap();
        fs.truncate(&OWNER, "/g", 4).unwrap();
        assert_eq!(fs.read(&OWNER, "/g", 4, 0).unwrap(), vec![0u8; 4]);
    }

    #[test]
    fn truncate_shrink_and_to_zero() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        fs.write(&OWNER, "/f", b"abcdef", 0).unwrap();
        fs.truncate(&OWNER, "/f", 2).unwrap();
        assert_eq!(fs.read(&OWNER, "/f", 10, 0).unwrap(), b"ab");
        fs.truncate(&OWNER, "/f", 0).unwrap();
        assert_eq!(fs.getattr(&OWNER, "/f").unwrap().size, 0);
        assert!(fs.read(&OWNER, "/f", 10, 0).unwrap().is_empty());
        assert!(matches!(
            fs.truncate(&OWNER, "/f", MAX_FILE_SIZE + 1),
            Err(FsError::FileTooBig { .. })
        ));
    }

    #[test]
    fn open_checks_access() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o640).unwrap();
        fs.mkdir(&OWNER, "/d", 0o755).unwrap();

        fs.open(&OWNER, "/f", OpenAccess::ReadWrite).unwrap();
        fs.open(&MEMBER, "/f", OpenAccess::ReadOnly).unwrap();
        assert!(matches!(
            fs.open(&MEMBER, "/f", OpenAccess::WriteOnly),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(
            fs.open(&STRANGER, "/f", OpenAccess::ReadOnly),
            Err(FsError::PermissionDenied(_))
        ));

        fs.open(&OWNER, "/d", OpenAccess::ReadOnly).unwrap();
        assert!(matches!(
            fs.open(&OWNER, "/d", OpenAccess::ReadWrite),
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.open(&OWNER, "/missing", OpenAccess::ReadOnly),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn unlink_removes_file_and_content() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        fs.write(&OWNER, "/f", b"data", 0).unwrap();
        fs.unlink(&OWNER, "/f").unwrap();
        assert!(matches!(fs.getattr(&OWNER, "/f"), Err(FsError::NotFound(_))));
        assert_eq!(fs.getattr(&OWNER, "/").unwrap().size, 0);
        assert!(fs.verify().unwrap().is_clean());
    }

    #[test]
    fn unlink_rules() {
        let fs = fs();
        fs.mkdir(&OWNER, "/d", 0o755).unwrap();
        assert!(matches!(fs.unlink(&OWNER, "/d"), Err(FsError::IsADirectory(_))));
        assert!(matches!(fs.unlink(&OWNER, "/nope"), Err(FsError::NotFound(_))));
        fs.create(&OWNER, "/d/f", 0o666).unwrap();
        // The parent is not writable by group members.
        assert!(matches!(
            fs.unlink(&MEMBER, "/d/f"),
            Err(FsError::PermissionDenied(_))
        ));
    }

    #[test]
    fn create_rules() {
        let fs = fs();
        fs.create(&OWNER, "/f", 0o644).unwrap();
        assert!(matches!(fs.create(&OWNER, "/f", 0o644), Err(FsError::AlreadyExists(_))));
        assert!(matches!(fs.create(&OWNER, "/f/g", 0o644), Err(FsError::NotADirectory(_))));
        assert!(matches!(fs.create(&OWNER, "/x/g", 0o644), Err(FsError::NotFound(_))));
        assert!(matches!(fs.create(&OWNER, "/", 0o644), Err(FsError::InvalidArgument(_))));
        let long = format!("/{}", "n".repeat(256));
        assert!(matches!(fs.create(&OWNER, &long, 0o644), Err(FsError::NameTooLong(_))));
        let max = format!("/{}", "n".repeat(255));
        fs.create(&OWNER, &max, 0o644).unwrap();
        assert!(matches!(
            fs.create(&STRANGER, "/s", 0o644),
            Err(FsError::PermissionDenied(_))
        ));
    }

    #[test]
    fn flush_and_release_are_noops() {
        let fs = fs();
        fs.flush("/anything").unwrap();
        fs.release("/anything").unwrap();
    }
}
