//! Slash-separated path handling.
//!
//! Empty components are ignored, so `a//b/` and `/a/b` name the same node.
//! `.` and `..` have no special meaning during lookup, and they cannot be
//! created.

use kvfs_types::MAX_NAME_LEN;

use crate::error::{FsError, FsResult};

/// Non-empty components of `path`, in order.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Canonical form of `path`: a leading slash and single separators.
pub fn normalize(path: &str) -> String {
    join_components(&components(path))
}

pub fn join_components(parts: &[&str]) -> String {
    format!("/{}", parts.join("/"))
}

/// Append `name` to a directory path.
pub fn child(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Split `path` into its parent directory and leaf name.
///
/// The root has no parent and yields `InvalidArgument`.
pub fn split_parent(path: &str) -> FsResult<(String, &str)> {
    let parts = components(path);
    let Some((leaf, parent)) = parts.split_last() else {
        return Err(FsError::InvalidArgument(format!("{path}: the root has no parent")));
    };
    Ok((join_components(parent), leaf))
}

/// Check that `name` can be stored as a new directory entry.
pub fn validate_leaf(name: &str) -> FsResult<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong(name.to_string()));
    }
    if name == "." || name == ".." || name.contains('\0') {
        return Err(FsError::InvalidArgument(format!("{name:?} is not a valid name")));
    }
    Ok(())
}

/// Whether `inner` names `outer` or a node below it.
pub fn is_within(inner: &str, outer: &str) -> bool {
    let inner = components(inner);
    let outer = components(outer);
    inner.len() >= outer.len() && inner[..outer.len()] == outer[..]
}
