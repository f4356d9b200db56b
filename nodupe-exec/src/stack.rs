use std::fs;
use std::path::{Path, PathBuf};

use nodupe_types::{AuditEventKind, OperationKind, OperationRecord, OperationStatus};
use serde::{Deserialize, Serialize};

use crate::audit::AuditLog;
use crate::error::ExecError;
use crate::reversible::ReversibleOperation;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StackEntry {
    record: OperationRecord,
    op: ReversibleOperation,
}

/// Ordered, bounded, persisted history of [`ReversibleOperation`]s.
/// Persisted to `path` so a later `rollback` invocation — a separate
/// process — can undo a previous apply.
pub struct OperationStack {
    path: PathBuf,
    limit: usize,
    entries: Vec<StackEntry>,
    next_id: u64,
}

impl OperationStack {
    pub fn load(path: &Path, limit: usize) -> Result<Self, ExecError> {
        let entries: Vec<StackEntry> = match fs::read_to_string(path) {
            Ok(s) if !s.trim().is_empty() => serde_json::from_str(&s)?,
            Ok(_) => Vec::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(ExecError::io(path.display().to_string(), e)),
        };
        let next_id = entries.iter().map(|e| e.record.id).max().unwrap_or(0) + 1;
        Ok(OperationStack {
            path: path.to_path_buf(),
            limit,
            entries,
            next_id,
        })
    }

    fn persist(&self) -> Result<(), ExecError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).map_err(|e| ExecError::io(self.path.display().to_string(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> Vec<OperationRecord> {
        self.entries.iter().map(|e| e.record.clone()).collect()
    }

    /// Executes `op` through a write-ahead discipline: a `started` audit
    /// event, a pending `OperationRecord` persisted before `execute()` runs,
    /// then either `committed` + `apply_completed` or `failed` +
    /// `apply_failed`. A failure does not pop or otherwise disturb other
    /// records already on the stack.
    pub fn push_and_execute(
        &mut self,
        kind: OperationKind,
        mut op: ReversibleOperation,
        audit: &mut AuditLog,
        correlation_id: String,
    ) -> Result<u64, ExecError> {
        let id = self.next_id;
        self.next_id += 1;
        let timestamp = chrono::Utc::now().timestamp();
        let describe = op.describe();

        audit.record(
            AuditEventKind::ApplyStarted,
            serde_json::json!({
                "correlation_id": correlation_id,
                "operation_id": id,
                "describe": describe,
            }),
        )?;

        let forward = serde_json::to_value(&op)?;
        let record = OperationRecord {
            id,
            kind,
            timestamp,
            forward,
            inverse: serde_json::Value::Null,
            correlation_id: correlation_id.clone(),
            status: OperationStatus::Pending,
        };
        self.entries.push(StackEntry { record, op });
        self.persist()?;

        let idx = self.entries.len() - 1;
        let result = self.entries[idx].op.execute();

        match result {
            Ok(()) => {
                self.entries[idx].record.status = OperationStatus::Committed;
                self.entries[idx].record.inverse = serde_json::to_value(&self.entries[idx].op)?;
                self.evict_if_over_limit(audit)?;
                self.persist()?;
                audit.record(
                    AuditEventKind::ApplyCompleted,
                    serde_json::json!({"correlation_id": correlation_id, "operation_id": id}),
                )?;
                Ok(id)
            }
            Err(e) => {
                self.entries[idx].record.status = OperationStatus::Failed;
                self.persist()?;
                audit.record(
                    AuditEventKind::ApplyFailed,
                    serde_json::json!({
                        "correlation_id": correlation_id,
                        "operation_id": id,
                        "error": e.to_string(),
                    }),
                )?;
                Err(e)
            }
        }
    }

    /// When `entries.len()` would exceed `limit`, evicts the oldest
    /// committed record with no undo, recording the eviction.
    fn evict_if_over_limit(&mut self, audit: &mut AuditLog) -> Result<(), ExecError> {
        while self.entries.len() > self.limit {
            let evicted = self.entries.remove(0);
            log::warn!(
                "operation stack at capacity ({}); evicting operation {} with no undo",
                self.limit,
                evicted.record.id
            );
            audit.record(
                AuditEventKind::SystemError,
                serde_json::json!({
                    "reason": "operation_stack_eviction",
                    "operation_id": evicted.record.id,
                    "describe": evicted.op.describe(),
                }),
            )?;
        }
        Ok(())
    }

    fn undo_at(&mut self, idx: usize, audit: &mut AuditLog) -> Result<(), ExecError> {
        let correlation_id = self.entries[idx].record.correlation_id.clone();
        let operation_id = self.entries[idx].record.id;

        audit.record(
            AuditEventKind::RollbackOperationStarted,
            serde_json::json!({"correlation_id": correlation_id, "operation_id": operation_id}),
        )?;

        match self.entries[idx].op.undo() {
            Ok(()) => {
                audit.record(
                    AuditEventKind::RollbackOperationCompleted,
                    serde_json::json!({"correlation_id": correlation_id, "operation_id": operation_id}),
                )?;
                self.entries.remove(idx);
                self.persist()?;
                Ok(())
            }
            Err(e) => {
                audit.record(
                    AuditEventKind::RollbackOperationFailed,
                    serde_json::json!({
                        "correlation_id": correlation_id,
                        "operation_id": operation_id,
                        "error": e.to_string(),
                    }),
                )?;
                Err(e)
            }
        }
    }

    /// Pops the last committed record and undoes it. Returns `false` when
    /// there is nothing committed to undo.
    pub fn undo_last(&mut self, audit: &mut AuditLog) -> Result<bool, ExecError> {
        let idx = self
            .entries
            .iter()
            .rposition(|e| e.record.status == OperationStatus::Committed);
        let idx = match idx {
            Some(i) => i,
            None => return Ok(false),
        };
        self.undo_at(idx, audit)?;
        Ok(true)
    }

    /// Repeatedly undoes the last committed record until none remain or an
    /// undo fails in a way that indicates on-disk state is corrupt (the
    /// captured backup no longer exists), at which point the sweep halts.
    /// Other undo failures are logged and the sweep moves on to the next
    /// record down the stack. Returns the count of successful undos.
    pub fn undo_all(&mut self, audit: &mut AuditLog) -> Result<usize, ExecError> {
        let mut count = 0;
        loop {
            let idx = self
                .entries
                .iter()
                .rposition(|e| e.record.status == OperationStatus::Committed);
            let idx = match idx {
                Some(i) => i,
                None => break,
            };
            match self.undo_at(idx, audit) {
                Ok(()) => count += 1,
                Err(ExecError::UndoFailed(msg)) if msg.contains("no backup") || msg.contains("never executed") => {
                    log::error!("halting rollback sweep: {msg}");
                    return Err(ExecError::UndoFailed(msg));
                }
                Err(e) => {
                    log::warn!("undo of operation failed, continuing sweep: {e}");
                    // mark as undone-with-error so the sweep doesn't retry it forever.
                    self.entries[idx].record.status = OperationStatus::Undone;
                    self.persist()?;
                }
            }
        }
        Ok(count)
    }

    /// Undoes every committed record down to and including `marker_id`.
    pub fn undo_to(&mut self, marker_id: u64, audit: &mut AuditLog) -> Result<usize, ExecError> {
        let mut count = 0;
        loop {
            let idx = self
                .entries
                .iter()
                .rposition(|e| e.record.status == OperationStatus::Committed);
            let idx = match idx {
                Some(i) => i,
                None => break,
            };
            let id = self.entries[idx].record.id;
            self.undo_at(idx, audit)?;
            count += 1;
            if id == marker_id {
                break;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn new_audit(dir: &TempDir) -> AuditLog {
        AuditLog::open(&dir.path().join("audit.log"), &dir.path().join("audit.jsonl")).unwrap()
    }

    fn delete_op(dir: &TempDir, name: &str) -> (ReversibleOperation, PathBuf) {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(b"x").unwrap();
        (
            ReversibleOperation::DeleteFile {
                path: path.clone(),
                trash_dir: dir.path().join("trash"),
                captured: None,
            },
            path,
        )
    }

    #[test]
    fn push_and_execute_then_undo_last_restores_file() {
        let dir = TempDir::new().unwrap();
        let mut audit = new_audit(&dir);
        let mut stack = OperationStack::load(&dir.path().join("stack.json"), 100).unwrap();

        let (op, path) = delete_op(&dir, "a.txt");
        stack
            .push_and_execute(OperationKind::Delete, op, &mut audit, "c1".into())
            .unwrap();
        assert!(!path.exists());

        let undone = stack.undo_last(&mut audit).unwrap();
        assert!(undone);
        assert!(path.exists());
        assert!(stack.is_empty());
    }

    #[test]
    fn undo_last_on_empty_stack_returns_false() {
        let dir = TempDir::new().unwrap();
        let mut audit = new_audit(&dir);
        let mut stack = OperationStack::load(&dir.path().join("stack.json"), 100).unwrap();
        assert!(!stack.undo_last(&mut audit).unwrap());
    }

    #[test]
    fn eviction_drops_oldest_when_over_limit() {
        let dir = TempDir::new().unwrap();
        let mut audit = new_audit(&dir);
        let mut stack = OperationStack::load(&dir.path().join("stack.json"), 2).unwrap();

        for i in 0..3 {
            let (op, _) = delete_op(&dir, &format!("f{i}.txt"));
            stack
                .push_and_execute(OperationKind::Delete, op, &mut audit, format!("c{i}"))
                .unwrap();
        }

        assert_eq!(stack.len(), 2);
        let ids: Vec<_> = stack.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn undo_all_restores_every_committed_operation() {
        let dir = TempDir::new().unwrap();
        let mut audit = new_audit(&dir);
        let mut stack = OperationStack::load(&dir.path().join("stack.json"), 100).unwrap();

        let mut paths = Vec::new();
        for i in 0..3 {
            let (op, path) = delete_op(&dir, &format!("f{i}.txt"));
            paths.push(path);
            stack
                .push_and_execute(OperationKind::Delete, op, &mut audit, format!("c{i}"))
                .unwrap();
        }

        let count = stack.undo_all(&mut audit).unwrap();
        assert_eq!(count, 3);
        for p in paths {
            assert!(p.exists());
        }
    }
}
