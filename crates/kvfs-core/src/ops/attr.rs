use kvfs_types::now_secs;
use tracing::debug;

use crate::attr::{FileAttr, TimeUpdate};
use crate::caller::Caller;
use crate::error::{FsError, FsResult};
use crate::filesystem::Filesystem;
use crate::permission::{has_permission, is_owner, AccessMode};
use crate::resolve::resolve;

impl Filesystem {
    pub fn getattr(&self, caller: &Caller, path: &str) -> FsResult<FileAttr> {
        debug!(path, "getattr");
        let store = self.read_store()?;
        let found = resolve(&store, caller, path)?;
        Ok(FileAttr::from(&found.fcb))
    }

    /// Replace the permission bits. Owner or superuser only; the file type
    /// is kept.
    pub fn chmod(&self, caller: &Caller, path: &str, perm: u32) -> FsResult<()> {
        debug!(path, perm, "chmod");
        let store = self.write_store()?;
        let mut found = resolve(&store, caller, path)?;
        if !is_owner(&found.fcb, caller) {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        found.fcb.set_perm(perm);
        found.fcb.ctime = now_secs();
        store.put_record(&found.key, &found.fcb)?;
        Ok(())
    }

    /// Change owner and/or group. `None` leaves a field as it is.
    ///
    /// With `restrict_chown` set, anyone but the superuser must own the file,
    /// keep its uid, and may only switch the group to their own gid.
    pub fn chown(
        &self,
        caller: &Caller,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> FsResult<()> {
        debug!(path, ?uid, ?gid, "chown");
        let store = self.write_store()?;
        let mut found = resolve(&store, caller, path)?;

        if self.config().restrict_chown && !caller.is_superuser() {
            let fcb = &found.fcb;
            let owns = caller.uid == fcb.uid;
            let keeps_uid = uid.map_or(true, |u| u == fcb.uid);
            let gid_ok = gid.map_or(true, |g| g == fcb.gid || g == caller.gid);
            if !(owns && keeps_uid && gid_ok) {
                return Err(FsError::PermissionDenied(path.to_string()));
            }
        }

        if let Some(uid) = uid {
            found.fcb.uid = uid;
        }
        if let Some(gid) = gid {
            found.fcb.gid = gid;
        }
        found.fcb.ctime = now_secs();
        store.put_record(&found.key, &found.fcb)?;
        Ok(())
    }

    /// Set modification and access times; unset values become now. The
    /// change time is always bumped.
    ///
    /// Explicit times need the owner (or superuser); stamping "now" is also
    /// allowed with write permission.
    pub fn utime(&self, caller: &Caller, path: &str, times: TimeUpdate) -> FsResult<()> {
        debug!(path, ?times, "utime");
        let store = self.write_store()?;
        let mut found = resolve(&store, caller, path)?;

        let explicit = times.mtime.is_some() || times.atime.is_some();
        let allowed = is_owner(&found.fcb, caller)
            || (!explicit && has_permission(&found.fcb, caller, AccessMode::Write));
        if !allowed {
            return Err(FsError::PermissionDenied(path.to_string()));
        }

        let now = now_secs();
        found.fcb.mtime = times.mtime.unwrap_or(now);
        found.fcb.atime = times.atime.unwrap_or(now);
        found.fcb.ctime = now;
        store.put_record(&found.key, &found.fcb)?;
        Ok(())
    }
}
