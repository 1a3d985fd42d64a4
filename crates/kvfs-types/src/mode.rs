//! POSIX mode bits as stored in [`Fcb::mode`](crate::Fcb::mode).
//!
//! The values match the traditional `<sys/stat.h>` octal constants so that a
//! stored mode can be handed to the kernel bridge unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mask selecting the file-type bits.
pub const S_IFMT: u32 = 0o170000;
/// Directory type bit.
pub const S_IFDIR: u32 = 0o040000;
/// Regular-file type bit.
pub const S_IFREG: u32 = 0o100000;

/// Mask selecting permission bits (including setuid/setgid/sticky).
pub const PERM_MASK: u32 = 0o7777;

pub const S_IRUSR: u32 = 0o400;
pub const S_IWUSR: u32 = 0o200;
pub const S_IXUSR: u32 = 0o100;
pub const S_IRGRP: u32 = 0o040;
pub const S_IWGRP: u32 = 0o020;
pub const S_IXGRP: u32 = 0o010;
pub const S_IROTH: u32 = 0o004;
pub const S_IWOTH: u32 = 0o002;
pub const S_IXOTH: u32 = 0o001;

pub const S_IRWXU: u32 = S_IRUSR | S_IWUSR | S_IXUSR;
pub const S_IRWXG: u32 = S_IRGRP | S_IWGRP | S_IXGRP;

/// The two record types kvfs stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Regular,
    Directory,
}

impl FileKind {
    /// The `S_IF*` bit for this kind.
    pub fn type_bits(&self) -> u32 {
        match self {
            Self::Regular => S_IFREG,
            Self::Directory => S_IFDIR,
        }
    }

    /// Classify a stored mode. Anything that is not a directory is a file.
    pub fn from_mode(mode: u32) -> Self {
        if mode & S_IFMT == S_IFDIR {
            Self::Directory
        } else {
            Self::Regular
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Render a mode as `drwxr-x---` style text.
pub fn symbolic(mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(match FileKind::from_mode(mode) {
        FileKind::Directory => 'd',
        FileKind::Regular => '-',
    });
    for (bit, ch) in [
        (S_IRUSR, 'r'),
        (S_IWUSR, 'w'),
        (S_IXUSR, 'x'),
        (S_IRGRP, 'r'),
        (S_IWGRP, 'w'),
        (S_IXGRP, 'x'),
        (S_IROTH, 'r'),
        (S_IWOTH, 'w'),
        (S_IXOTH, 'x'),
    ] {
        out.push(if mode & bit != 0 { ch } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_mode() {
        assert_eq!(FileKind::from_mode(S_IFDIR | 0o755), FileKind::Directory);
        assert_eq!(FileKind::from_mode(S_IFREG | 0o644), FileKind::Regular);
    }

    #[test]
    fn symbolic_rendering() {
        assert_eq!(symbolic(S_IFDIR | 0o750), "drwxr-x---");
        assert_eq!(symbolic(S_IFREG | 0o644), "-rw-r--r--");
    }
}
