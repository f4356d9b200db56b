use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use nodupe_types::{BackupEntry, BackupManifest};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::ExecError;

const MANIFEST_ENTRY: &str = "manifest.json";

/// Writes every path in `paths` into a self-describing zip archive at
/// `archive_path`, plus a `manifest.json` entry listing each entry's
/// original path and content hash. When `catalog_path` is given, the
/// catalog database file is snapshotted first, under `database/`, and
/// recorded as the manifest's `catalog_snapshot_entry`. Used both by
/// `BackupManager::snapshot` and `ArchiveFiles::execute` (which has no
/// catalog to snapshot and passes `None`).
pub fn write_archive(
    archive_path: &Path,
    catalog_path: Option<&Path>,
    paths: &[PathBuf],
) -> Result<BackupManifest, ExecError> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExecError::io(parent.display().to_string(), e))?;
    }

    let file = File::create(archive_path).map_err(|e| ExecError::io(archive_path.display().to_string(), e))?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let catalog_snapshot_entry = match catalog_path {
        Some(path) if path.exists() => {
            let entry_name = format!("database/{}", file_name_of(path));
            zip.start_file(&entry_name, options).map_err(ExecError::Zip)?;
            let mut src = File::open(path).map_err(|e| ExecError::io(path.display().to_string(), e))?;
            std::io::copy(&mut src, &mut zip).map_err(|e| ExecError::io(path.display().to_string(), e))?;
            Some(entry_name)
        }
        _ => None,
    };

    let mut entries = Vec::new();

    for (idx, path) in paths.iter().enumerate() {
        let hash = nodupe_hash::full_hash(path, nodupe_hash::DEFAULT_CHUNK_SIZE)
            .map_err(|e| ExecError::BackupFailed(format!("hashing {path:?}: {e}")))?;
        let size = fs::metadata(path)
            .map_err(|e| ExecError::io(path.display().to_string(), e))?
            .len();

        let entry_name = format!("files/{idx}_{}", file_name_of(path));
        zip.start_file(&entry_name, options)
            .map_err(ExecError::Zip)?;
        let mut src = File::open(path).map_err(|e| ExecError::io(path.display().to_string(), e))?;
        std::io::copy(&mut src, &mut zip).map_err(|e| ExecError::io(path.display().to_string(), e))?;

        entries.push(BackupEntry {
            original_path: path.display().to_string(),
            archive_entry_path: entry_name,
            size,
            hash,
        });
    }

    let manifest = BackupManifest {
        created_at: chrono::Utc::now().timestamp(),
        operation_id: archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        entries,
        catalog_snapshot_entry,
    };

    zip.start_file(MANIFEST_ENTRY, options).map_err(ExecError::Zip)?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())
        .map_err(|e| ExecError::io(archive_path.display().to_string(), e))?;

    zip.finish().map_err(ExecError::Zip)?;

    Ok(manifest)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads `archive_path`'s manifest entry back out.
pub fn read_manifest(archive_path: &Path) -> Result<BackupManifest, ExecError> {
    let file = File::open(archive_path).map_err(|e| ExecError::io(archive_path.display().to_string(), e))?;
    let mut archive = ZipArchive::new(file).map_err(ExecError::Zip)?;
    let mut entry = archive.by_name(MANIFEST_ENTRY).map_err(ExecError::Zip)?;
    let mut contents = String::new();
    entry
        .read_to_string(&mut contents)
        .map_err(|e| ExecError::io(archive_path.display().to_string(), e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Restores every original-path file in the archive's manifest from its
/// archive entry, used by `ArchiveFiles::undo`.
pub fn restore_archive(archive_path: &Path, _expected_paths: &[PathBuf]) -> Result<(), ExecError> {
    let manifest = read_manifest(archive_path)?;
    let file = File::open(archive_path).map_err(|e| ExecError::io(archive_path.display().to_string(), e))?;
    let mut archive = ZipArchive::new(file).map_err(ExecError::Zip)?;

    for entry in &manifest.entries {
        let mut zip_entry = archive.by_name(&entry.archive_entry_path).map_err(ExecError::Zip)?;
        let original = PathBuf::from(&entry.original_path);
        if let Some(parent) = original.parent() {
            fs::create_dir_all(parent).map_err(|e| ExecError::io(parent.display().to_string(), e))?;
        }
        let mut out = File::create(&original).map_err(|e| ExecError::io(original.display().to_string(), e))?;
        std::io::copy(&mut zip_entry, &mut out).map_err(|e| ExecError::io(original.display().to_string(), e))?;
    }

    Ok(())
}

/// Verifies every entry in `archive_path`'s manifest: the archive can be
/// re-opened, and each entry's recomputed hash matches what was captured at
/// creation time.
pub fn verify_archive(archive_path: &Path) -> Result<bool, ExecError> {
    let manifest = read_manifest(archive_path)?;
    let file = File::open(archive_path).map_err(|e| ExecError::io(archive_path.display().to_string(), e))?;
    let mut archive = ZipArchive::new(file).map_err(ExecError::Zip)?;

    for entry in &manifest.entries {
        let mut zip_entry = archive.by_name(&entry.archive_entry_path).map_err(ExecError::Zip)?;
        let mut buf = Vec::new();
        zip_entry
            .read_to_end(&mut buf)
            .map_err(|e| ExecError::io(archive_path.display().to_string(), e))?;

        let mut hasher = openssl::sha::Sha256::new();
        hasher.update(&buf);
        let recomputed = hex::encode(hasher.finish());
        if recomputed != entry.hash {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Creates and manages pre-apply snapshot archives under a dedicated
/// directory.
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: PathBuf) -> Self {
        BackupManager { dir }
    }

    /// Snapshots the catalog database plus `paths` into a timestamped
    /// archive named after `operation_id`. The caller is responsible for
    /// calling this before any filesystem mutation.
    pub fn snapshot(
        &self,
        operation_id: &str,
        catalog_path: &Path,
        paths: &[PathBuf],
    ) -> Result<(PathBuf, BackupManifest), ExecError> {
        fs::create_dir_all(&self.dir).map_err(|e| ExecError::io(self.dir.display().to_string(), e))?;
        let micros = chrono::Utc::now().timestamp_micros();
        let archive_path = self.dir.join(format!("{operation_id}-{micros}.zip"));
        let manifest = write_archive(&archive_path, Some(catalog_path), paths)?;
        Ok((archive_path, manifest))
    }

    /// Deletes the oldest archives in the backup directory beyond
    /// `keep_count`, ordered by filename (which embeds a microsecond
    /// timestamp, so lexicographic order is chronological order).
    pub fn cleanup(&self, keep_count: usize) -> Result<usize, ExecError> {
        let mut archives: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(|e| ExecError::io(self.dir.display().to_string(), e))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("zip"))
            .collect();
        archives.sort();

        let mut removed = 0;
        if archives.len() > keep_count {
            for path in &archives[..archives.len() - keep_count] {
                fs::remove_file(path).map_err(|e| ExecError::io(path.display().to_string(), e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File as StdFile;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        let mut f = StdFile::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    #[test]
    fn snapshot_then_verify_roundtrips() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        write_file(&a, b"hello");
        let catalog = dir.path().join("catalog.db");
        write_file(&catalog, b"pretend sqlite bytes");

        let manager = BackupManager::new(dir.path().join("backups"));
        let (archive_path, manifest) = manager.snapshot("op1", &catalog, &[a]).unwrap();

        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.catalog_snapshot_entry.as_deref(), Some("database/catalog.db"));
        assert!(verify_archive(&archive_path).unwrap());
    }

    #[test]
    fn snapshot_without_existing_catalog_omits_the_entry() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        write_file(&a, b"hello");

        let manager = BackupManager::new(dir.path().join("backups"));
        let (_, manifest) = manager.snapshot("op1", &dir.path().join("missing.db"), &[a]).unwrap();

        assert!(manifest.catalog_snapshot_entry.is_none());
    }

    #[test]
    fn cleanup_keeps_only_newest_n() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        write_file(&a, b"hello");
        let manager = BackupManager::new(dir.path().join("backups"));
        let missing_catalog = dir.path().join("catalog.db");

        for _ in 0..3 {
            manager.snapshot("op", &missing_catalog, &[a.clone()]).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let removed = manager.cleanup(1).unwrap();
        assert_eq!(removed, 2);
        let remaining = fs::read_dir(dir.path().join("backups")).unwrap().count();
        assert_eq!(remaining, 1);
    }
}
