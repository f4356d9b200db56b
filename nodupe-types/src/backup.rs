use serde::{Deserialize, Serialize};

/// One file captured inside a backup archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub original_path: String,
    pub archive_entry_path: String,
    pub size: u64,
    pub hash: String,
}

/// Describes a pre-apply snapshot archive; persisted as the archive's
/// `manifest.json` entry and mirrored in the catalog's backup table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub created_at: i64,
    pub operation_id: String,
    pub entries: Vec<BackupEntry>,
    /// Path to the catalog snapshot entry inside the archive, if one was
    /// captured alongside the file backups.
    pub catalog_snapshot_entry: Option<String>,
}
