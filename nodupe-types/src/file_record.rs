use serde::{Deserialize, Serialize};

/// Stable integer identifier for a [`FileRecord`] row.
pub type FileId = i64;

/// Lifecycle state of a file as tracked by the catalog.
///
/// `Removed` implies the on-disk file is either gone or relocated under a
/// trash/backup path recorded on the operation that removed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Active,
    Archived,
    Removed,
}

impl Default for FileStatus {
    fn default() -> Self {
        FileStatus::Active
    }
}

/// A single discovered file and everything the pipeline knows about it.
///
/// Invariants (enforced by `nodupe-catalog`, not by this type on its own):
/// - `path` is unique across active records.
/// - `is_duplicate` implies `duplicate_of` is `Some`, non-self, and points at
///   a record sharing `full_hash` whose own `is_duplicate` is `false`.
/// - `full_hash` is set for every record that participates in a duplicate
///   group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub path: String,
    pub size: u64,
    pub modified_time: i64,
    pub head_hash: Option<String>,
    pub full_hash: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_of: Option<FileId>,
    pub status: FileStatus,
    pub scanned_at: i64,
    pub updated_at: i64,
    /// Set when the hasher could not read this file; `full_hash` stays `None`.
    pub hash_failed: bool,
}

impl FileRecord {
    /// Construct the record a fresh scan discovery produces, before any
    /// hashing has happened.
    pub fn new_discovered(path: String, size: u64, modified_time: i64, now: i64) -> Self {
        FileRecord {
            id: 0,
            path,
            size,
            modified_time,
            head_hash: None,
            full_hash: None,
            is_duplicate: false,
            duplicate_of: None,
            status: FileStatus::Active,
            scanned_at: now,
            updated_at: now,
            hash_failed: false,
        }
    }

    /// True once this record carries enough information to participate in a
    /// duplicate group comparison.
    pub fn is_hashed(&self) -> bool {
        self.full_hash.is_some()
    }
}
