//! POSIX owner/group/other permission evaluation.

use kvfs_types::Fcb;

use crate::caller::Caller;
use crate::error::{FsError, FsResult};

/// The access being asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    Execute,
}

impl AccessMode {
    /// The `rwx` bit within one permission class.
    fn class_bit(self) -> u32 {
        match self {
            Self::Read => 0o4,
            Self::Write => 0o2,
            Self::Execute => 0o1,
        }
    }
}

/// Decide whether `caller` may access `fcb` in `mode`.
///
/// The superuser always passes. Otherwise exactly one class decides: owner
/// if the uid matches, else group if the gid matches, else other. A matching
/// owner is judged by the owner bits alone even when group or other bits
/// would grant more.
pub fn has_permission(fcb: &Fcb, caller: &Caller, mode: AccessMode) -> bool {
    if caller.is_superuser() {
        return true;
    }
    let class = if caller.uid == fcb.uid {
        (fcb.mode >> 6) & 0o7
    } else if caller.gid == fcb.gid {
        (fcb.mode >> 3) & 0o7
    } else {
        fcb.mode & 0o7
    };
    class & mode.class_bit() != 0
}

/// [`has_permission`] as a result, naming `path` in the error.
pub fn require(fcb: &Fcb, caller: &Caller, mode: AccessMode, path: &str) -> FsResult<()> {
    if has_permission(fcb, caller, mode) {
        Ok(())
    } else {
        Err(FsError::PermissionDenied(path.to_string()))
    }
}

/// Owner or superuser.
pub fn is_owner(fcb: &Fcb, caller: &Caller) -> bool {
    caller.is_superuser() || caller.uid == fcb.uid
}
