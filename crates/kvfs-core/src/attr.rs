use kvfs_types::{Fcb, FileKind};
use serde::Serialize;

/// Attributes reported by `getattr`, shaped like `struct stat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileAttr {
    pub kind: FileKind,
    /// Type bits and permission bits.
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: i64,
    pub ctime: i64,
    pub atime: i64,
}

impl From<&Fcb> for FileAttr {
    fn from(fcb: &Fcb) -> Self {
        Self {
            kind: fcb.kind(),
            mode: fcb.mode,
            nlink: 1,
            uid: fcb.uid,
            gid: fcb.gid,
            size: fcb.size,
            mtime: fcb.mtime,
            ctime: fcb.ctime,
            atime: fcb.atime,
        }
    }
}

impl FileAttr {
    pub fn perm(&self) -> u32 {
        self.mode & kvfs_types::mode::PERM_MASK
    }
}

/// One child of a directory with its attributes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub name: String,
    #[serde(flatten)]
    pub attr: FileAttr,
}

/// Access requested by `open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl OpenAccess {
    /// Classify `open(2)` flags by their access mode.
    pub fn from_flags(flags: i32) -> Self {
        match flags & libc::O_ACCMODE {
            libc::O_WRONLY => Self::WriteOnly,
            libc::O_RDWR => Self::ReadWrite,
            _ => Self::ReadOnly,
        }
    }

    pub fn reads(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// New times for `utime`. A missing value means "now".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimeUpdate {
    pub mtime: Option<i64>,
    pub atime: Option<i64>,
}

impl TimeUpdate {
    pub fn now() -> Self {
        Self::default()
    }
}
