use kvfs_store::StoreError;

/// Errors returned by filesystem operations.
///
/// Every variant maps to one errno value (see [`FsError::errno`]); the
/// bridge reports the negated value to the kernel.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("file name too long: {0}")]
    NameTooLong(String),

    #[error("file too large: {size} bytes exceeds the {max} byte limit")]
    FileTooBig { size: u64, max: u64 },

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("file exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any failure of the underlying key-value tiers.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The stored tree violates a structural rule.
    #[error("corrupt filesystem: {0}")]
    Corrupt(String),

    /// A directory entry that a successful resolution vouched for vanished
    /// before the mutation that needed it. The tree can no longer be trusted.
    #[error("internal inconsistency: entry {name:?} missing from {parent}")]
    InternalInconsistency { parent: String, name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("filesystem lock poisoned")]
    LockPoisoned,
}

impl FsError {
    /// Positive errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound(_) => libc::ENOENT,
            Self::NotADirectory(_) => libc::ENOTDIR,
            Self::IsADirectory(_) => libc::EISDIR,
            Self::PermissionDenied(_) => libc::EACCES,
            Self::NameTooLong(_) => libc::ENAMETOOLONG,
            Self::FileTooBig { .. } => libc::EFBIG,
            Self::DirectoryNotEmpty(_) => libc::ENOTEMPTY,
            Self::AlreadyExists(_) => libc::EEXIST,
            Self::InvalidArgument(_) | Self::Config(_) => libc::EINVAL,
            Self::Storage(_)
            | Self::Corrupt(_)
            | Self::InternalInconsistency { .. }
            | Self::LockPoisoned => libc::EIO,
        }
    }

    /// The negative return code a FUSE-style bridge expects.
    pub fn to_neg_errno(&self) -> i32 {
        -self.errno()
    }

    /// Symbolic errno name, e.g. `"ENOENT"`.
    pub fn errno_name(&self) -> &'static str {
        match self.errno() {
            libc::ENOENT => "ENOENT",
            libc::ENOTDIR => "ENOTDIR",
            libc::EISDIR => "EISDIR",
            libc::EACCES => "EACCES",
            libc::ENAMETOOLONG => "ENAMETOOLONG",
            libc::EFBIG => "EFBIG",
            libc::ENOTEMPTY => "ENOTEMPTY",
            libc::EEXIST => "EEXIST",
            libc::EINVAL => "EINVAL",
            _ => "EIO",
        }
    }

    /// Whether the filesystem should stop serving requests.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalInconsistency { .. })
    }
}

/// Result alias for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;
