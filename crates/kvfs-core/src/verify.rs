//! Consistency checking (fsck) and usage statistics.

use std::collections::HashSet;
use std::fmt;

use kvfs_store::TieredStore;
use kvfs_types::{DirectoryBlob, Fcb, ObjectId, StoreKey, DIRENT_SIZE, MAX_FILE_SIZE, MAX_NAME_LEN};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::FsResult;
use crate::filesystem::Filesystem;
use crate::path::child;

/// Result of walking the whole tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub directories: u64,
    pub files: u64,
    /// Sum of the sizes of all file records.
    pub content_bytes: u64,
    pub problems: Vec<Problem>,
}

impl VerifyReport {
    /// Returns `true` if no problems were found.
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// One structural defect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub path: String,
    pub kind: ProblemKind,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Directory size is not a whole number of entries.
    MisalignedDirectory,
    /// Stored blob length differs from the record's size.
    SizeMismatch,
    /// Record claims content that is not stored.
    MissingContent,
    /// Directory blob does not decode.
    CorruptBlob,
    /// Entry points at a record the mirror does not hold.
    DanglingEntry,
    /// A record is reachable through more than one entry.
    SharedRecord,
    /// Two entries in one directory share a name.
    DuplicateName,
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MisalignedDirectory => "misaligned directory",
            Self::SizeMismatch => "size mismatch",
            Self::MissingContent => "missing content",
            Self::CorruptBlob => "corrupt directory blob",
            Self::DanglingEntry => "dangling entry",
            Self::SharedRecord => "shared record",
            Self::DuplicateName => "duplicate name",
        };
        f.write_str(s)
    }
}

/// Usage figures in the spirit of `statfs(2)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatFs {
    pub files: u64,
    pub directories: u64,
    pub content_bytes: u64,
    pub max_name_len: usize,
    pub max_file_size: u64,
}

impl Filesystem {
    /// Walk every record reachable from the root and report defects.
    ///
    /// Storage failures abort the walk; structural defects are collected.
    pub fn verify(&self) -> FsResult<VerifyReport> {
        let store = self.read_store()?;
        let report = walk(&store)?;
        if report.is_clean() {
            info!(
                directories = report.directories,
                files = report.files,
                "filesystem verified clean"
            );
        } else {
            warn!(problems = report.problems.len(), "filesystem has problems");
        }
        Ok(report)
    }

    pub fn statfs(&self) -> FsResult<StatFs> {
        let store = self.read_store()?;
        let report = walk(&store)?;
        Ok(StatFs {
            files: report.files,
            directories: report.directories,
            content_bytes: report.content_bytes,
            max_name_len: MAX_NAME_LEN,
            max_file_size: MAX_FILE_SIZE,
        })
    }
}

fn walk(store: &TieredStore) -> FsResult<VerifyReport> {
    let mut report = VerifyReport::default();
    let mut seen: HashSet<ObjectId> = HashSet::new();
    let root = store.require_record(&StoreKey::Root)?;
    let mut stack: Vec<(String, Fcb)> = vec![("/".to_string(), root)];

    while let Some((path, fcb)) = stack.pop() {
        let mut problem = |kind, detail: String| {
            report.problems.push(Problem {
                path: path.clone(),
                kind,
                detail,
            })
        };

        if !fcb.is_dir() {
            if fcb.has_content() {
                match store.get_content(&fcb.content)? {
                    None => problem(
                        ProblemKind::MissingContent,
                        format!("no blob under {}", fcb.content.short_hex()),
                    ),
                    Some(blob) if blob.len() as u64 != fcb.size => problem(
                        ProblemKind::SizeMismatch,
                        format!("record says {} bytes, blob has {}", fcb.size, blob.len()),
                    ),
                    Some(_) => {}
                }
            }
            report.files += 1;
            report.content_bytes += fcb.size;
            continue;
        }

        report.directories += 1;
        if fcb.size % DIRENT_SIZE as u64 != 0 {
            problem(
                ProblemKind::MisalignedDirectory,
                format!("size {} is not a multiple of {DIRENT_SIZE}", fcb.size),
            );
            continue;
        }
        if !fcb.has_content() {
            continue;
        }

        let Some(blob) = store.get_content(&fcb.content)? else {
            problem(
                ProblemKind::MissingContent,
                format!("no blob under {}", fcb.content.short_hex()),
            );
            continue;
        };
        if blob.len() as u64 != fcb.size {
            problem(
                ProblemKind::SizeMismatch,
                format!("record says {} bytes, blob has {}", fcb.size, blob.len()),
            );
        }
        let entries = match DirectoryBlob::decode(&blob) {
            Ok(entries) => entries,
            Err(e) => {
                problem(ProblemKind::CorruptBlob, e.to_string());
                continue;
            }
        };

        let mut names = HashSet::new();
        for entry in entries.entries() {
            let entry_path = child(&path, &entry.name);
            if !names.insert(entry.name.as_str()) {
                problem(ProblemKind::DuplicateName, format!("{:?} appears twice", entry.name));
            }
            if !seen.insert(entry.child) {
                problem(
                    ProblemKind::SharedRecord,
                    format!("{entry_path} points at {} seen elsewhere", entry.child.short_hex()),
                );
                continue;
            }
            match store.get_record(&StoreKey::Object(entry.child))? {
                Some(child_fcb) => stack.push((entry_path, child_fcb)),
                None => problem(
                    ProblemKind::DanglingEntry,
                    format!("{entry_path} points at missing record {}", entry.child.short_hex()),
                ),
            }
        }
    }

    Ok(report)
}
