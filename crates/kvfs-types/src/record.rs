use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::mode::{FileKind, PERM_MASK, S_IFMT};
use crate::object::ObjectId;
use crate::temporal::now_secs;

/// Encoded width of an [`Fcb`].
///
/// uid, gid, mode (3 x u32), mtime, ctime, atime (3 x i64), size (u64) and
/// the 16-byte content key.
pub const FCB_SIZE: usize = 4 * 3 + 8 * 3 + 8 + 16;

/// Largest size a file may reach: 1 MiB - 1 bytes.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024 - 1;

/// Metadata record (file control block) for one file or directory.
///
/// `size` is the exact byte length of the content blob stored under
/// `content`; for directories that is `entries * DIRENT_SIZE`. A size of 0
/// means no blob has been stored yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fcb {
    pub uid: u32,
    pub gid: u32,
    /// File-type bit combined with permission bits.
    pub mode: u32,
    /// Last content modification.
    pub mtime: i64,
    /// Last metadata change.
    pub ctime: i64,
    /// Last access.
    pub atime: i64,
    pub size: u64,
    /// Key of the content blob in the durable tier. A reference, not ownership.
    pub content: ObjectId,
}

impl Fcb {
    /// A fresh, empty record of the given kind stamped with the current time.
    ///
    /// Only the permission bits of `perm` are kept; the type bit comes from
    /// `kind`. The content key is generated here but no blob is stored for it.
    pub fn new(kind: FileKind, perm: u32, uid: u32, gid: u32) -> Self {
        let now = now_secs();
        Self {
            uid,
            gid,
            mode: kind.type_bits() | (perm & PERM_MASK),
            mtime: now,
            ctime: now,
            atime: now,
            size: 0,
            content: ObjectId::generate(),
        }
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    /// Permission bits without the file type.
    pub fn perm(&self) -> u32 {
        self.mode & PERM_MASK
    }

    /// Replace the permission bits, keeping the file type.
    pub fn set_perm(&mut self, perm: u32) {
        self.mode = (self.mode & S_IFMT) | (perm & PERM_MASK);
    }

    /// Whether a content blob is expected under `content`.
    pub fn has_content(&self) -> bool {
        self.size > 0
    }

    /// Set mtime, ctime and atime to `now`.
    pub fn touch_all(&mut self, now: i64) {
        self.mtime = now;
        self.ctime = now;
        self.atime = now;
    }

    /// Encode to the fixed [`FCB_SIZE`]-byte little-endian layout.
    pub fn encode(&self) -> Result<Vec<u8>, TypeError> {
        let bytes =
            bincode::serialize(self).map_err(|e| TypeError::Serialization(e.to_string()))?;
        if bytes.len() != FCB_SIZE {
            return Err(TypeError::InvalidLength {
                expected: FCB_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Decode from bytes produced by [`Fcb::encode`]; any other length is rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != FCB_SIZE {
            return Err(TypeError::InvalidLength {
                expected: FCB_SIZE,
                actual: bytes.len(),
            });
        }
        bincode::deserialize(bytes).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
