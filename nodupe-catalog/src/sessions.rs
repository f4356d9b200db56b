use nodupe_types::{ScanSession, ScanSessionId, ScanSessionStatus};
use rusqlite::{params, OptionalExtension};

use crate::error::CatalogError;
use crate::Catalog;

fn status_str(status: ScanSessionStatus) -> &'static str {
    match status {
        ScanSessionStatus::Running => "running",
        ScanSessionStatus::Completed => "completed",
        ScanSessionStatus::Failed => "failed",
        ScanSessionStatus::Cancelled => "cancelled",
    }
}

fn parse_status(s: &str) -> ScanSessionStatus {
    match s {
        "completed" => ScanSessionStatus::Completed,
        "failed" => ScanSessionStatus::Failed,
        "cancelled" => ScanSessionStatus::Cancelled,
        _ => ScanSessionStatus::Running,
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<ScanSession> {
    let roots: String = row.get("roots")?;
    let status: String = row.get("status")?;
    Ok(ScanSession {
        id: row.get("id")?,
        roots: roots.split('\u{1f}').filter(|s| !s.is_empty()).map(String::from).collect(),
        started_at: row.get("started_at")?,
        finished_at: row.get("finished_at")?,
        files_seen: row.get::<_, i64>("files_seen")? as u64,
        files_hashed: row.get::<_, i64>("files_hashed")? as u64,
        bytes_hashed: row.get::<_, i64>("bytes_hashed")? as u64,
        status: parse_status(&status),
    })
}

impl Catalog {
    pub fn start_scan_session(&self, roots: &[String], started_at: i64) -> Result<ScanSessionId, CatalogError> {
        self.connection().execute(
            "INSERT INTO scan_sessions (roots, started_at, status) VALUES (?1, ?2, 'running')",
            params![roots.join("\u{1f}"), started_at],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn update_scan_session_progress(
        &self,
        id: ScanSessionId,
        files_seen: u64,
        files_hashed: u64,
        bytes_hashed: u64,
    ) -> Result<(), CatalogError> {
        self.connection().execute(
            "UPDATE scan_sessions SET files_seen = ?2, files_hashed = ?3, bytes_hashed = ?4 \
             WHERE id = ?1",
            params![id, files_seen as i64, files_hashed as i64, bytes_hashed as i64],
        )?;
        Ok(())
    }

    pub fn finish_scan_session(
        &self,
        id: ScanSessionId,
        status: ScanSessionStatus,
        finished_at: i64,
    ) -> Result<(), CatalogError> {
        self.connection().execute(
            "UPDATE scan_sessions SET status = ?2, finished_at = ?3 WHERE id = ?1",
            params![id, status_str(status), finished_at],
        )?;
        Ok(())
    }

    pub fn get_scan_session(&self, id: ScanSessionId) -> Result<Option<ScanSession>, CatalogError> {
        self.connection()
            .query_row(
                "SELECT id, roots, started_at, finished_at, files_seen, files_hashed, \
                 bytes_hashed, status FROM scan_sessions WHERE id = ?1",
                params![id],
                row_to_session,
            )
            .optional()
            .map_err(CatalogError::from)
    }
}
