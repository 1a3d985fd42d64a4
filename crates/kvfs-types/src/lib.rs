//! Record model for kvfs.
//!
//! kvfs keeps a POSIX-like directory tree inside a key-value store. This
//! crate defines the fixed-layout records that live in that store and the
//! keys they are stored under. Every other kvfs crate depends on
//! `kvfs-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- 128-bit random identifier for records and content blobs
//! - [`StoreKey`] -- the key a metadata record is stored under (root or object)
//! - [`Fcb`] -- metadata record (owner, mode, timestamps, size, content key)
//! - [`DirEntry`] -- one `(child key, name)` pair inside a directory blob
//! - [`DirectoryBlob`] -- the packed entry array that forms a directory's content
//!
//! # Layout Rules
//!
//! 1. The root record lives under the fixed 4-byte key [`ROOT_KEY`].
//! 2. Every other record and every content blob lives under a 16-byte key.
//! 3. [`Fcb`] encodes to exactly [`FCB_SIZE`] bytes, [`DirEntry`] to exactly
//!    [`DIRENT_SIZE`] bytes. Decoders reject any other length.

pub mod dirent;
pub mod error;
pub mod mode;
pub mod object;
pub mod record;
pub mod temporal;

pub use dirent::{DirEntry, DirectoryBlob, DIRENT_SIZE, MAX_NAME_LEN, NAME_FIELD_SIZE};
pub use error::TypeError;
pub use mode::FileKind;
pub use object::{ObjectId, StoreKey, OBJECT_KEY_SIZE, ROOT_KEY};
pub use record::{Fcb, FCB_SIZE, MAX_FILE_SIZE};
pub use temporal::now_secs;
