//! Object storage for kvfs.
//!
//! Two key-value tiers hold the filesystem:
//!
//! - a *volatile mirror* ([`InMemoryKvStore`]) that answers every metadata
//!   read during normal operation and is empty after a restart, and
//! - a *durable log* ([`LogKvStore`]) that every write goes through
//!   synchronously and that is the source of truth on restart.
//!
//! [`TieredStore`] layers the record/content discipline on top of any pair
//! of [`KvStore`] backends.
//!
//! # Design Rules
//!
//! 1. Metadata records are written to the mirror first, then to the durable
//!    tier; a write is acknowledged only once both agree.
//! 2. Content blobs live only in the durable tier.
//! 3. A missing key is `Ok(None)`; every other failure is an error.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod log;
pub mod memory;
pub mod tiered;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use log::{LogConfig, LogKvStore, SyncMode};
pub use memory::InMemoryKvStore;
pub use tiered::TieredStore;
pub use traits::KvStore;
