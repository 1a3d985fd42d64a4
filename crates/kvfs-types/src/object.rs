use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Fixed key of the root metadata record.
///
/// Its length differs from [`OBJECT_KEY_SIZE`], so it can never collide with
/// a generated key.
pub const ROOT_KEY: &[u8; 4] = b"root";

/// Length of every generated key.
pub const OBJECT_KEY_SIZE: usize = 16;

/// Randomly generated identifier for a metadata record or content blob.
///
/// Generated once when the record is created and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; OBJECT_KEY_SIZE]);

impl ObjectId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Create an `ObjectId` from raw bytes.
    pub const fn from_raw(bytes: [u8; OBJECT_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse from a byte slice, which must be exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; OBJECT_KEY_SIZE] =
            bytes.try_into().map_err(|_| TypeError::InvalidLength {
                expected: OBJECT_KEY_SIZE,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// The raw 16 bytes.
    pub fn as_bytes(&self) -> &[u8; OBJECT_KEY_SIZE] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// The key a metadata record is stored under.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// The root directory's record, under [`ROOT_KEY`].
    Root,
    /// Any other record, under its generated id.
    Object(ObjectId),
}

impl StoreKey {
    /// The byte key exchanged with the key-value tiers.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Root => ROOT_KEY,
            Self::Object(id) => id.as_bytes(),
        }
    }
}

impl From<ObjectId> for StoreKey {
    fn from(id: ObjectId) -> Self {
        Self::Object(id)
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "StoreKey(root)"),
            Self::Object(id) => write!(f, "StoreKey({})", id.short_hex()),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root"),
            Self::Object(id) => write!(f, "{id}"),
        }
    }
}
