use nodupe_types::{OperationKind, OperationRecord, OperationStatus};
use rusqlite::{params, OptionalExtension};

use crate::error::CatalogError;
use crate::Catalog;

fn kind_str(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::Delete => "delete",
        OperationKind::Move => "move",
        OperationKind::Copy => "copy",
        OperationKind::Hardlink => "hardlink",
        OperationKind::Archive => "archive",
        OperationKind::PlanApply => "plan_apply",
    }
}

fn parse_kind(s: &str) -> OperationKind {
    match s {
        "move" => OperationKind::Move,
        "copy" => OperationKind::Copy,
        "hardlink" => OperationKind::Hardlink,
        "archive" => OperationKind::Archive,
        "plan_apply" => OperationKind::PlanApply,
        _ => OperationKind::Delete,
    }
}

fn status_str(status: OperationStatus) -> &'static str {
    match status {
        OperationStatus::Pending => "pending",
        OperationStatus::Committed => "committed",
        OperationStatus::Failed => "failed",
        OperationStatus::Undone => "undone",
    }
}

fn parse_status(s: &str) -> OperationStatus {
    match s {
        "committed" => OperationStatus::Committed,
        "failed" => OperationStatus::Failed,
        "undone" => OperationStatus::Undone,
        _ => OperationStatus::Pending,
    }
}

fn row_to_operation(row: &rusqlite::Row) -> rusqlite::Result<OperationRecord> {
    let kind: String = row.get("kind")?;
    let status: String = row.get("status")?;
    let forward: String = row.get("forward")?;
    let inverse: String = row.get("inverse")?;
    Ok(OperationRecord {
        id: row.get::<_, i64>("id")? as u64,
        kind: parse_kind(&kind),
        timestamp: row.get("timestamp")?,
        forward: serde_json::from_str(&forward).unwrap_or(serde_json::Value::Null),
        inverse: serde_json::from_str(&inverse).unwrap_or(serde_json::Value::Null),
        correlation_id: row.get("correlation_id")?,
        status: parse_status(&status),
    })
}

/// Catalog-side ledger of every `OperationRecord` ever executed, keyed
/// independently from the bounded, file-persisted `OperationStack` in
/// `nodupe-exec` (see that crate for why the two exist side by side).
impl Catalog {
    pub fn add_operation(&self, record: &OperationRecord) -> Result<u64, CatalogError> {
        self.connection().execute(
            "INSERT INTO operations (id, kind, timestamp, forward, inverse, correlation_id, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id as i64,
                kind_str(record.kind),
                record.timestamp,
                record.forward.to_string(),
                record.inverse.to_string(),
                record.correlation_id,
                status_str(record.status),
            ],
        )?;
        Ok(record.id)
    }

    pub fn update_operation_status(
        &self,
        id: u64,
        status: OperationStatus,
    ) -> Result<(), CatalogError> {
        let changed = self.connection().execute(
            "UPDATE operations SET status = ?2 WHERE id = ?1",
            params![id as i64, status_str(status)],
        )?;
        if changed == 0 {
            return Err(CatalogError::NotFound(format!("operation {id}")));
        }
        Ok(())
    }

    pub fn get_operation(&self, id: u64) -> Result<Option<OperationRecord>, CatalogError> {
        self.connection()
            .query_row(
                "SELECT id, kind, timestamp, forward, inverse, correlation_id, status \
                 FROM operations WHERE id = ?1",
                params![id as i64],
                row_to_operation,
            )
            .optional()
            .map_err(CatalogError::from)
    }

    /// Every operation ever recorded, most recent first.
    pub fn list_operations(&self) -> Result<Vec<OperationRecord>, CatalogError> {
        let mut stmt = self.connection().prepare(
            "SELECT id, kind, timestamp, forward, inverse, correlation_id, status \
             FROM operations ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map([], row_to_operation)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
