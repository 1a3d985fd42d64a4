//! Directory entries and the packed blob that holds them.
//!
//! A directory's content blob is a flat array of fixed-width records:
//!
//! ```text
//! [16 bytes: child record key][256 bytes: NUL-padded name]
//! ```
//!
//! The array is order-irrelevant; removal moves the last entry into the
//! vacated slot.

use crate::error::TypeError;
use crate::object::{ObjectId, OBJECT_KEY_SIZE};

/// Width of the name field, terminator included.
pub const NAME_FIELD_SIZE: usize = 256;

/// Longest usable name in bytes.
pub const MAX_NAME_LEN: usize = NAME_FIELD_SIZE - 1;

/// Encoded width of one [`DirEntry`].
pub const DIRENT_SIZE: usize = OBJECT_KEY_SIZE + NAME_FIELD_SIZE;

/// One child of a directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    /// Key of the child's metadata record.
    pub child: ObjectId,
    pub name: String,
}

impl DirEntry {
    pub fn new(child: ObjectId, name: impl Into<String>) -> Self {
        Self {
            child,
            name: name.into(),
        }
    }

    /// Check that `name` can be stored in the fixed-width name field.
    pub fn validate_name(name: &str) -> Result<(), TypeError> {
        let reason = if name.is_empty() {
            "empty"
        } else if name.len() > MAX_NAME_LEN {
            "longer than 255 bytes"
        } else if name.contains('\0') {
            "contains NUL"
        } else if name.contains('/') {
            "contains '/'"
        } else {
            return Ok(());
        };
        Err(TypeError::InvalidName {
            name: name.to_string(),
            reason,
        })
    }

    /// Append the fixed-width encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), TypeError> {
        Self::validate_name(&self.name)?;
        out.extend_from_slice(self.child.as_bytes());
        let mut field = [0u8; NAME_FIELD_SIZE];
        field[..self.name.len()].copy_from_slice(self.name.as_bytes());
        out.extend_from_slice(&field);
        Ok(())
    }

    /// Decode exactly one [`DIRENT_SIZE`]-byte record.
    pub fn decode(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != DIRENT_SIZE {
            return Err(TypeError::InvalidLength {
                expected: DIRENT_SIZE,
                actual: bytes.len(),
            });
        }
        let (key, field) = bytes.split_at(OBJECT_KEY_SIZE);
        let child = ObjectId::from_slice(key)?;
        let end = field
            .iter()
            .position(|b| *b == 0)
            .ok_or(TypeError::UnterminatedName)?;
        let name = std::str::from_utf8(&field[..end]).map_err(|_| TypeError::InvalidName {
            name: String::from_utf8_lossy(&field[..end]).into_owned(),
            reason: "not valid UTF-8",
        })?;
        Ok(Self::new(child, name))
    }
}

/// Decoded content of a directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectoryBlob {
    entries: Vec<DirEntry>,
}

impl DirectoryBlob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a stored blob. Its length must be a multiple of [`DIRENT_SIZE`].
    pub fn decode(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() % DIRENT_SIZE != 0 {
            return Err(TypeError::MisalignedBlob(bytes.len()));
        }
        let entries = bytes
            .chunks_exact(DIRENT_SIZE)
            .map(DirEntry::decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn encode(&self) -> Result<Vec<u8>, TypeError> {
        let mut out = Vec::with_capacity(self.byte_len());
        for entry in &self.entries {
            entry.encode_into(&mut out)?;
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size the encoded blob occupies, which is what the owning record's
    /// `size` must equal.
    pub fn byte_len(&self) -> usize {
        self.entries.len() * DIRENT_SIZE
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Position of the first entry named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Append an entry at the end.
    pub fn push(&mut self, entry: DirEntry) -> Result<(), TypeError> {
        DirEntry::validate_name(&entry.name)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Remove the entry named `name`, moving the last entry into its slot.
    pub fn remove(&mut self, name: &str) -> Option<DirEntry> {
        let idx = self.position(name)?;
        Some(self.entries.swap_remove(idx))
    }

    /// Rename the entry named `from` in place. Returns `false` if absent.
    pub fn rename_in_place(&mut self, from: &str, to: &str) -> Result<bool, TypeError> {
        DirEntry::validate_name(to)?;
        match self.entries.iter_mut().find(|e| e.name == from) {
            Some(entry) => {
                entry.name = to.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::hash_set;
    use proptest::prelude::*;

    fn entry(n: u8, name: &str) -> DirEntry {
        DirEntry::new(ObjectId::from_raw([n; 16]), name)
    }

    #[test]
    fn entry_width_is_272() {
        let mut out = Vec::new();
        entry(1, "a").encode_into(&mut out).unwrap();
        assert_eq!(out.len(), DIRENT_SIZE);
        assert_eq!(DIRENT_SIZE, 272);
        assert_eq!(&out[..16], &[1u8; 16]);
        assert_eq!(out[16], b'a');
        assert!(out[17..].iter().all(|b| *b == 0));
    }

    #[test]
    fn max_length_name_fits() {
        let name = "x".repeat(MAX_NAME_LEN);
        let mut blob = DirectoryBlob::new();
        blob.push(entry(1, &name)).unwrap();
        let decoded = DirectoryBlob::decode(&blob.encode().unwrap()).unwrap();
        assert_eq!(decoded.entries()[0].name, name);
    }

    #[test]
    fn rejects_bad_names() {
        let long = "y".repeat(256);
        for bad in ["", "a/b", "nul\0", long.as_str()] {
            assert!(DirEntry::validate_name(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn decode_rejects_misaligned_blob() {
        let mut bytes = Vec::new();
        entry(1, "a").encode_into(&mut bytes).unwrap();
        bytes.pop();
        assert_eq!(
            DirectoryBlob::decode(&bytes),
            Err(TypeError::MisalignedBlob(DIRENT_SIZE - 1))
        );
    }

    #[test]
    fn decode_rejects_unterminated_name() {
        let bytes = vec![b'z'; DIRENT_SIZE];
        assert_eq!(DirEntry::decode(&bytes), Err(TypeError::UnterminatedName));
    }

    #[test]
    fn remove_moves_last_into_slot() {
        let mut blob = DirectoryBlob::new();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            blob.push(entry(i as u8 + 1, name)).unwrap();
        }
        let removed = blob.remove("b").unwrap();
        assert_eq!(removed.name, "b");
        let names: Vec<_> = blob.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "d", "c"]);
        assert_eq!(blob.byte_len(), 3 * DIRENT_SIZE);
        assert!(blob.remove("zzz").is_none());
    }

    #[test]
    fn rename_in_place_keeps_position_and_key() {
        let mut blob = DirectoryBlob::new();
        blob.push(entry(1, "a")).unwrap();
        blob.push(entry(2, "b")).unwrap();
        assert!(blob.rename_in_place("a", "z").unwrap());
        assert_eq!(blob.entries()[0], entry(1, "z"));
        assert!(!blob.rename_in_place("missing", "q").unwrap());
        assert!(blob.rename_in_place("b", "").is_err());
    }

    proptest! {
        #[test]
        fn byte_len_tracks_entry_count(names in hash_set("[a-z]{1,12}", 0..20)) {
            let mut blob = DirectoryBlob::new();
            for (i, name) in names.iter().enumerate() {
                blob.push(entry(i as u8, name)).unwrap();
            }
            let bytes = blob.encode().unwrap();
            prop_assert_eq!(bytes.len(), names.len() * DIRENT_SIZE);
            prop_assert_eq!(DirectoryBlob::decode(&bytes).unwrap().len(), names.len());
        }

        #[test]
        fn removing_everything_empties_the_blob(names in hash_set("[a-z]{1,8}", 1..16)) {
            let mut blob = DirectoryBlob::new();
            for (i, name) in names.iter().enumerate() {
                blob.push(entry(i as u8, name)).unwrap();
            }
            for name in &names {
                prop_assert!(blob.remove(name).is_some());
                prop_assert!(blob.find(name).is_none());
            }
            prop_assert!(blob.is_empty());
        }
    }
}
