use std::path::{Path, PathBuf};

use nodupe_types::{FileId, FileRecord, FileStatus};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CatalogError;
use crate::lock::WriteLock;
use crate::schema;

/// Persistent, transactional, typed storage for the NoDupeLabs data model;
/// the single source of truth consulted by the Planner and Executor.
///
/// Concurrent readers are permitted (SQLite WAL-style multi-reader); writers
/// are serialized through `write_lock` plus SQLite's own transaction
/// machinery, with lock acquisition scoped to the call that needs it.
pub struct Catalog {
    conn: Connection,
    path: PathBuf,
    write_lock: WriteLock,
}

fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let status: String = row.get("status")?;
    Ok(FileRecord {
        id: row.get("id")?,
        path: row.get("path")?,
        size: row.get::<_, i64>("size")? as u64,
        modified_time: row.get("modified_time")?,
        head_hash: row.get("head_hash")?,
        full_hash: row.get("full_hash")?,
        is_duplicate: row.get::<_, i64>("is_duplicate")? != 0,
        duplicate_of: row.get("duplicate_of")?,
        status: match status.as_str() {
            "archived" => FileStatus::Archived,
            "removed" => FileStatus::Removed,
            _ => FileStatus::Active,
        },
        scanned_at: row.get("scanned_at")?,
        updated_at: row.get("updated_at")?,
        hash_failed: row.get::<_, i64>("hash_failed")? != 0,
    })
}

fn status_str(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Active => "active",
        FileStatus::Archived => "archived",
        FileStatus::Removed => "removed",
    }
}

const FILE_COLUMNS: &str = "id, path, size, modified_time, head_hash, full_hash, \
     is_duplicate, duplicate_of, status, scanned_at, updated_at, hash_failed";

impl Catalog {
    /// Opens (creating if absent) the catalog at `path`, acquiring the
    /// cross-process advisory write lock and running any pending schema
    /// migrations. The lock and connection are released together when the
    /// returned `Catalog` is dropped.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let lock_path = path.with_extension("lock");
        let write_lock = WriteLock::acquire(&lock_path)?;

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::open_and_migrate(&conn)?;

        log::info!("catalog opened at {path:?}");

        Ok(Catalog {
            conn,
            path: path.to_path_buf(),
            write_lock,
        })
    }

    /// Explicit close; equivalent to dropping the value, kept for callers
    /// that want to assert the lock is released at a specific point.
    pub fn close(self) {
        log::info!("catalog at {:?} closed", self.path);
        drop(self);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_file(&self, record: &FileRecord) -> Result<FileId, CatalogError> {
        if self.get_file_by_path(&record.path)?.is_some() {
            return Err(CatalogError::DuplicatePath(record.path.clone()));
        }

        self.conn.execute(
            "INSERT INTO files (path, size, modified_time, head_hash, full_hash, \
             is_duplicate, duplicate_of, status, scanned_at, updated_at, hash_failed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.path,
                record.size as i64,
                record.modified_time,
                record.head_hash,
                record.full_hash,
                record.is_duplicate as i64,
                record.duplicate_of,
                status_str(record.status),
                record.scanned_at,
                record.updated_at,
                record.hash_failed as i64,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Inserts every record in `records` as one transaction: either all
    /// succeed or none are applied.
    pub fn batch_add_files(&mut self, records: &[FileRecord]) -> Result<usize, CatalogError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO files (path, size, modified_time, head_hash, full_hash, \
                 is_duplicate, duplicate_of, status, scanned_at, updated_at, hash_failed) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.path,
                    record.size as i64,
                    record.modified_time,
                    record.head_hash,
                    record.full_hash,
                    record.is_duplicate as i64,
                    record.duplicate_of,
                    status_str(record.status),
                    record.scanned_at,
                    record.updated_at,
                    record.hash_failed as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn get_file(&self, id: FileId) -> Result<Option<FileRecord>, CatalogError> {
        self.conn
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
                params![id],
                row_to_file_record,
            )
            .optional()
            .map_err(CatalogError::from)
    }

    pub fn get_file_by_path(&self, path: &str) -> Result<Option<FileRecord>, CatalogError> {
        self.conn
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"),
                params![path],
                row_to_file_record,
            )
            .optional()
            .map_err(CatalogError::from)
    }

    /// All active records sharing `full_hash`, ordered by path. Caller is
    /// expected to only invoke this for hashes known to have >= 2 members
    /// (via `duplicate_hashes`); a singleton result is not itself an error.
    pub fn find_duplicates_by_hash(&self, full_hash: &str) -> Result<Vec<FileRecord>, CatalogError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE full_hash = ?1 AND status = 'active' ORDER BY path"
        ))?;
        let rows = stmt
            .query_map(params![full_hash], row_to_file_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every `full_hash` with >= 2 active members. Streamed via a prepared
    /// statement + `GROUP BY`/`HAVING` so the implementation never
    /// materializes the full `files` table to answer this.
    pub fn duplicate_hashes(&self) -> Result<Vec<String>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT full_hash FROM files \
             WHERE full_hash IS NOT NULL AND status = 'active' \
             GROUP BY full_hash HAVING COUNT(*) >= 2",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_as_duplicate(&self, id: FileId, keeper_id: FileId) -> Result<(), CatalogError> {
        if id == keeper_id {
            return Err(CatalogError::Integrity(format!(
                "file {id} cannot be marked as its own duplicate"
            )));
        }
        let changed = self.conn.execute(
            "UPDATE files SET is_duplicate = 1, duplicate_of = ?2 WHERE id = ?1",
            params![id, keeper_id],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn mark_as_original(&self, id: FileId) -> Result<(), CatalogError> {
        let changed = self.conn.execute(
            "UPDATE files SET is_duplicate = 0, duplicate_of = NULL WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Reassigns a whole non-keeper set in one transaction.
    pub fn batch_mark_as_duplicate(
        &mut self,
        ids: &[FileId],
        keeper_id: FileId,
    ) -> Result<(), CatalogError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("UPDATE files SET is_duplicate = 1, duplicate_of = ?2 WHERE id = ?1")?;
            for id in ids {
                if *id == keeper_id {
                    return Err(CatalogError::Integrity(format!(
                        "file {id} cannot be marked as its own duplicate"
                    )));
                }
                stmt.execute(params![id, keeper_id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn update_file(&self, record: &FileRecord) -> Result<(), CatalogError> {
        let changed = self.conn.execute(
            "UPDATE files SET path = ?2, size = ?3, modified_time = ?4, head_hash = ?5, \
             full_hash = ?6, is_duplicate = ?7, duplicate_of = ?8, status = ?9, \
             updated_at = ?10, hash_failed = ?11 WHERE id = ?1",
            params![
                record.id,
                record.path,
                record.size as i64,
                record.modified_time,
                record.head_hash,
                record.full_hash,
                record.is_duplicate as i64,
                record.duplicate_of,
                status_str(record.status),
                record.updated_at,
                record.hash_failed as i64,
            ],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(record.id.to_string()));
        }
        Ok(())
    }

    pub fn delete_file(&self, id: FileId) -> Result<(), CatalogError> {
        let changed = self
            .conn
            .execute("DELETE FROM files WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Every active record, used by the Scan Pipeline to decide which
    /// discovered paths are unchanged (and can skip hashing) versus new or
    /// modified since the last scan.
    pub fn all_active_files(&self) -> Result<Vec<FileRecord>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {FILE_COLUMNS} FROM files WHERE status = 'active'"))?;
        let rows = stmt
            .query_map([], row_to_file_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_files(&self) -> Result<u64, CatalogError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files WHERE status = 'active'", [], |r| r.get(0))?;
        Ok(count as u64)
    }

    pub fn count_duplicates(&self) -> Result<u64, CatalogError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM files WHERE status = 'active' AND is_duplicate = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Digest over `(count_files, count_duplicates, max(updated_at))`, used
    /// by the Planner to stamp plans and by the Executor to detect a stale
    /// plan.
    pub fn catalog_version(&self) -> Result<String, CatalogError> {
        let max_updated: Option<i64> = self
            .conn
            .query_row("SELECT MAX(updated_at) FROM files", [], |r| r.get(0))?;

        let files = self.count_files()?;
        let dupes = self.count_duplicates()?;
        let max_updated = max_updated.unwrap_or(0);

        let mut hasher = openssl::sha::Sha256::new();
        hasher.update(&files.to_le_bytes());
        hasher.update(&dupes.to_le_bytes());
        hasher.update(&max_updated.to_le_bytes());
        Ok(hex::encode(hasher.finish()))
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
