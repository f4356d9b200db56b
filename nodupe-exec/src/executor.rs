use std::path::{Path, PathBuf};

use nodupe_catalog::Catalog;
use nodupe_types::{Action, ActionKind, AuditEventKind, FileStatus, OperationKind, Plan};

use crate::audit::AuditLog;
use crate::backup::BackupManager;
use crate::error::ExecError;
use crate::reversible::ReversibleOperation;
use crate::stack::OperationStack;

/// Pre-computed summary handed to the confirmation hook. The UI layer is
/// out of scope, but the audit trail stays informative by carrying these
/// fields rather than an opaque bool.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationSummary {
    pub file_count: usize,
    pub total_size: u64,
    pub large_operation: bool,
}

/// Threshold above which a plan apply is flagged "large" in the
/// confirmation summary and audit payload.
pub const LARGE_OPERATION_FILE_COUNT: usize = 100;
pub const LARGE_OPERATION_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct ExecSummary {
    pub executed: usize,
    pub skipped: usize,
    pub halted_on: Option<String>,
    pub backup_archive: Option<PathBuf>,
}

/// Verifies a plan's stamped catalog version against the live catalog. A
/// mismatch means the catalog changed since the plan was generated and the
/// caller must re-plan.
pub fn verify_plan_fresh(catalog: &Catalog, plan: &Plan) -> Result<(), ExecError> {
    let current = catalog.catalog_version()?;
    if plan.metadata.catalog_version != current {
        return Err(ExecError::PlanStale {
            plan: plan.metadata.catalog_version.clone(),
            current,
        });
    }
    Ok(())
}

/// Builds the confirmation summary an apply needs: total affected files
/// and bytes, with the "large operation" flag the original confirmation
/// flow used to escalate from yes/no to a typed phrase.
pub fn build_confirmation_summary(catalog: &Catalog, plan: &Plan) -> Result<ConfirmationSummary, ExecError> {
    let mut total_size = 0u64;
    let mut file_count = 0usize;
    for path in plan.affected_paths() {
        if let Some(record) = catalog.get_file_by_path(path)? {
            total_size += record.size;
            file_count += 1;
        }
    }
    let large_operation = file_count > LARGE_OPERATION_FILE_COUNT || total_size > LARGE_OPERATION_BYTES;
    Ok(ConfirmationSummary {
        file_count,
        total_size,
        large_operation,
    })
}

/// Executes every non-KEEP action of `plan` in order. The caller has
/// already obtained confirmation; this function re-verifies freshness,
/// snapshots a backup of the catalog database plus every affected path,
/// applies each operation, and records the completion audit event.
#[allow(clippy::too_many_arguments)]
pub fn execute_plan(
    catalog: &mut Catalog,
    plan: &Plan,
    stack: &mut OperationStack,
    audit: &mut AuditLog,
    backups: &BackupManager,
    trash_dir: &Path,
    correlation_id: String,
) -> Result<ExecSummary, ExecError> {
    verify_plan_fresh(catalog, plan)?;

    let catalog_path = catalog.path().to_path_buf();
    let affected: Vec<PathBuf> = plan.affected_paths().into_iter().map(PathBuf::from).collect();

    let (archive_path, _manifest) = backups.snapshot(&correlation_id, &catalog_path, &affected).map_err(|e| {
        let err = ExecError::BackupFailed(e.to_string());
        err
    })?;
    audit.record(
        AuditEventKind::BackupCreated,
        serde_json::json!({"correlation_id": correlation_id, "archive": archive_path}),
    )?;

    let mut summary = ExecSummary {
        backup_archive: Some(archive_path),
        ..Default::default()
    };

    for action in &plan.actions {
        if action.kind == ActionKind::Keep {
            continue;
        }

        let (kind, op, event_kind) = match build_operation(action, trash_dir) {
            Some(v) => v,
            None => {
                summary.skipped += 1;
                continue;
            }
        };

        let result = stack.push_and_execute(kind, op, audit, correlation_id.clone());
        match result {
            Ok(_) => {
                summary.executed += 1;
                audit.record(
                    event_kind,
                    serde_json::json!({"correlation_id": correlation_id, "path": action.path}),
                )?;
                apply_catalog_effect(catalog, action)?;
            }
            Err(e) => {
                summary.halted_on = Some(format!("{}: {e}", action.path));
                log::error!("apply halted at {}: {e}", action.path);
                break;
            }
        }
    }

    audit.record(
        AuditEventKind::ApplyCompleted,
        serde_json::json!({
            "correlation_id": correlation_id,
            "executed": summary.executed,
            "skipped": summary.skipped,
            "halted": summary.halted_on.is_some(),
        }),
    )?;

    Ok(summary)
}

fn build_operation(
    action: &Action,
    trash_dir: &Path,
) -> Option<(OperationKind, ReversibleOperation, AuditEventKind)> {
    let src = PathBuf::from(&action.path);
    match action.kind {
        ActionKind::Keep => None,
        ActionKind::Delete => Some((
            OperationKind::Delete,
            ReversibleOperation::DeleteFile {
                path: src,
                trash_dir: trash_dir.to_path_buf(),
                captured: None,
            },
            AuditEventKind::FileDeleted,
        )),
        ActionKind::Move => {
            let target = action.target.clone()?;
            Some((
                OperationKind::Move,
                ReversibleOperation::MoveFile {
                    src,
                    dst: PathBuf::from(target),
                    captured: None,
                },
                AuditEventKind::FileMoved,
            ))
        }
        ActionKind::Hardlink => {
            let keeper = action.keeper_path.clone()?;
            Some((
                OperationKind::Hardlink,
                ReversibleOperation::HardlinkFile {
                    src: PathBuf::from(keeper),
                    dst: src,
                    captured: None,
                },
                AuditEventKind::FileHardlinked,
            ))
        }
        ActionKind::Archive => {
            let target = action.target.clone()?;
            Some((
                OperationKind::Archive,
                ReversibleOperation::ArchiveFiles {
                    paths: vec![src],
                    archive_path: PathBuf::from(target),
                    delete_originals: true,
                    captured: None,
                },
                AuditEventKind::FileDeleted,
            ))
        }
    }
}

/// Applies the data-model side effect of a successfully-executed action.
/// On ARCHIVE or DELETE, `duplicate_of` is preserved and `status` flips; on
/// undo both are restored.
fn apply_catalog_effect(catalog: &mut Catalog, action: &Action) -> Result<(), ExecError> {
    let Some(mut record) = catalog.get_file_by_path(&action.path)? else {
        return Ok(());
    };
    record.status = match action.kind {
        ActionKind::Delete => FileStatus::Removed,
        ActionKind::Archive => FileStatus::Archived,
        ActionKind::Move => FileStatus::Removed,
        // the path still holds a file (now a hardlink sharing the keeper's
        // inode), so it stays active rather than removed.
        ActionKind::Hardlink => FileStatus::Active,
        ActionKind::Keep => return Ok(()),
    };
    catalog.update_file(&record)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodupe_types::{FileRecord, PlanMetadata, PlanStats, Strategy};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (Catalog, PathBuf, PathBuf) {
        let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        File::create(&a).unwrap().write_all(b"hello").unwrap();
        File::create(&b).unwrap().write_all(b"hello").unwrap();
        (catalog, a, b)
    }

    #[test]
    fn stale_plan_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (catalog, a, _b) = setup(&dir);

        let mut record = FileRecord::new_discovered(a.display().to_string(), 5, 100, 1);
        record.full_hash = Some("deadbeef".into());
        catalog.add_file(&record).unwrap();

        let plan = Plan {
            metadata: PlanMetadata {
                strategy: Strategy::Newest.as_str().to_string(),
                catalog_version: "stale-version".to_string(),
                generated_at: "2026-01-01T00:00:00Z".to_string(),
                stats: PlanStats::default(),
            },
            actions: vec![],
        };

        let err = verify_plan_fresh(&catalog, &plan).unwrap_err();
        assert!(matches!(err, ExecError::PlanStale { .. }));
    }

    #[test]
    fn execute_plan_deletes_non_keeper_and_updates_catalog() {
        let dir = TempDir::new().unwrap();
        let (mut catalog, a, b) = setup(&dir);

        let mut ra = FileRecord::new_discovered(a.display().to_string(), 5, 100, 1);
        ra.full_hash = Some("deadbeef".into());
        let mut rb = FileRecord::new_discovered(b.display().to_string(), 5, 100, 1);
        rb.full_hash = Some("deadbeef".into());
        catalog.batch_add_files(&[ra, rb]).unwrap();

        let version = catalog.catalog_version().unwrap();
        let plan = Plan {
            metadata: PlanMetadata {
                strategy: "newest".into(),
                catalog_version: version,
                generated_at: "2026-01-01T00:00:00Z".into(),
                stats: PlanStats {
                    total_groups: 1,
                    duplicates_found: 1,
                    reassigned: 0,
                },
            },
            actions: vec![
                Action {
                    kind: ActionKind::Keep,
                    path: a.display().to_string(),
                    target: None,
                    keeper_path: None,
                    reason: "keeper".into(),
                },
                Action {
                    kind: ActionKind::Delete,
                    path: b.display().to_string(),
                    target: None,
                    keeper_path: Some(a.display().to_string()),
                    reason: "duplicate".into(),
                },
            ],
        };

        let mut stack = OperationStack::load(&dir.path().join("stack.json"), 100).unwrap();
        let mut audit = AuditLog::open(&dir.path().join("audit.log"), &dir.path().join("audit.jsonl")).unwrap();
        let backups = BackupManager::new(dir.path().join("backups"));
        let trash = dir.path().join("trash");

        let summary = execute_plan(&mut catalog, &plan, &mut stack, &mut audit, &backups, &trash, "corr1".into())
            .unwrap();

        assert_eq!(summary.executed, 1);
        assert!(!b.exists());
        assert!(a.exists());

        let updated = catalog.get_file_by_path(&b.display().to_string()).unwrap().unwrap();
        assert_eq!(updated.status, FileStatus::Removed);
        assert_eq!(updated.duplicate_of, Some(
            catalog.get_file_by_path(&a.display().to_string()).unwrap().unwrap().id
        ));
    }
}
