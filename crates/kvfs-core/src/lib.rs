//! Filesystem engine for kvfs.
//!
//! Implements a POSIX-like directory tree over the two storage tiers of
//! `kvfs-store`. A virtual-filesystem bridge (FUSE or the `kvfs` CLI) calls
//! the operations on [`Filesystem`] with the caller's identity and a path,
//! and reports failures through [`FsError::to_neg_errno`].
//!
//! # Components
//!
//! - [`permission`] -- owner/group/other mode check with superuser bypass
//! - [`resolve`] -- walks a path from the root record to its target
//! - [`Filesystem`] -- operation handlers (`getattr`, `readdir`, `read`,
//!   `write`, `create`, `mkdir`, `unlink`, `rmdir`, `rename`, ...)
//! - [`recovery`] -- rebuilds the volatile mirror from the durable log
//! - [`verify`] -- fsck-style tree check and usage statistics
//!
//! # Design Rules
//!
//! 1. Read-only operations hold a shared lock for their whole sequence;
//!    mutations hold the exclusive lock.
//! 2. Every mutation reaches the durable tier before it returns.
//! 3. Multi-step mutations are not transactional. A failure after the
//!    parent update leaves the parent pointing at a record that does not
//!    exist; [`Filesystem::verify`] reports it.
//! 4. A directory entry that vanishes mid-operation is
//!    [`FsError::InternalInconsistency`], the one fatal error.

pub mod attr;
pub mod caller;
pub mod config;
pub mod error;
pub mod filesystem;
pub mod path;
pub mod permission;
pub mod recovery;
pub mod resolve;
pub mod verify;

mod ops;

pub use attr::{FileAttr, Listing, OpenAccess, TimeUpdate};
pub use caller::Caller;
pub use config::FsConfig;
pub use error::{FsError, FsResult};
pub use filesystem::Filesystem;
pub use permission::{has_permission, AccessMode};
pub use recovery::RecoveryReport;
pub use verify::{Problem, ProblemKind, StatFs, VerifyReport};
