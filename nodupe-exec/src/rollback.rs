use nodupe_types::AuditEventKind;

use crate::audit::AuditLog;
use crate::error::ExecError;
use crate::stack::OperationStack;

/// Wraps [`OperationStack::undo_all`] with the command-level
/// `rollback_started`/`rollback_completed`/`rollback_failed` audit pair,
/// distinct from the per-operation `rollback_operation_*` events the stack
/// itself emits.
pub fn rollback_all(stack: &mut OperationStack, audit: &mut AuditLog) -> Result<usize, ExecError> {
    audit.record(AuditEventKind::RollbackStarted, serde_json::json!({"scope": "all"}))?;
    match stack.undo_all(audit) {
        Ok(count) => {
            audit.record(
                AuditEventKind::RollbackCompleted,
                serde_json::json!({"scope": "all", "count": count}),
            )?;
            Ok(count)
        }
        Err(e) => {
            audit.record(
                AuditEventKind::RollbackFailed,
                serde_json::json!({"scope": "all", "error": e.to_string()}),
            )?;
            Err(e)
        }
    }
}

/// Undoes the last `n` committed operations.
pub fn rollback_last(stack: &mut OperationStack, audit: &mut AuditLog, n: usize) -> Result<usize, ExecError> {
    audit.record(
        AuditEventKind::RollbackStarted,
        serde_json::json!({"scope": "last", "requested": n}),
    )?;

    let mut count = 0;
    for _ in 0..n {
        match stack.undo_last(audit) {
            Ok(true) => count += 1,
            Ok(false) => break,
            Err(e) => {
                audit.record(
                    AuditEventKind::RollbackFailed,
                    serde_json::json!({"scope": "last", "error": e.to_string(), "completed": count}),
                )?;
                return Err(e);
            }
        }
    }

    audit.record(
        AuditEventKind::RollbackCompleted,
        serde_json::json!({"scope": "last", "count": count}),
    )?;
    Ok(count)
}

/// Undoes down to and including `marker_id`.
pub fn rollback_to(stack: &mut OperationStack, audit: &mut AuditLog, marker_id: u64) -> Result<usize, ExecError> {
    audit.record(
        AuditEventKind::RollbackStarted,
        serde_json::json!({"scope": "to", "marker_id": marker_id}),
    )?;
    match stack.undo_to(marker_id, audit) {
        Ok(count) => {
            audit.record(
                AuditEventKind::RollbackCompleted,
                serde_json::json!({"scope": "to", "marker_id": marker_id, "count": count}),
            )?;
            Ok(count)
        }
        Err(e) => {
            audit.record(
                AuditEventKind::RollbackFailed,
                serde_json::json!({"scope": "to", "marker_id": marker_id, "error": e.to_string()}),
            )?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reversible::ReversibleOperation;
    use nodupe_types::OperationKind;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn rollback_all_restores_files_and_empties_stack() {
        let dir = TempDir::new().unwrap();
        let mut audit = AuditLog::open(&dir.path().join("audit.log"), &dir.path().join("audit.jsonl")).unwrap();
        let mut stack = OperationStack::load(&dir.path().join("stack.json"), 100).unwrap();

        let path = dir.path().join("a.txt");
        File::create(&path).unwrap().write_all(b"x").unwrap();
        let op = ReversibleOperation::DeleteFile {
            path: path.clone(),
            trash_dir: dir.path().join("trash"),
            captured: None,
        };
        stack
            .push_and_execute(OperationKind::Delete, op, &mut audit, "c1".into())
            .unwrap();
        assert!(!path.exists());

        let count = rollback_all(&mut stack, &mut audit).unwrap();
        assert_eq!(count, 1);
        assert!(path.exists());
        assert!(stack.is_empty());
    }
}
