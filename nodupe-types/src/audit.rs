use serde::{Deserialize, Serialize};

/// The full, closed set of audit event kinds the core ever emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    ScanStarted,
    ScanCompleted,
    ScanFailed,
    ScanCancelled,
    FileProcessed,
    DuplicateFound,
    PlanCreated,
    PlanExecuted,
    ApplyStarted,
    ApplyCompleted,
    ApplyFailed,
    FileDeleted,
    FileMoved,
    FileCopied,
    FileHardlinked,
    BackupCreated,
    BackupRestored,
    BackupFailed,
    RollbackStarted,
    RollbackCompleted,
    RollbackFailed,
    RollbackOperationStarted,
    RollbackOperationCompleted,
    RollbackOperationFailed,
    UserConfirmation,
    SystemError,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::ScanStarted => "scan_started",
            AuditEventKind::ScanCompleted => "scan_completed",
            AuditEventKind::ScanFailed => "scan_failed",
            AuditEventKind::ScanCancelled => "scan_cancelled",
            AuditEventKind::FileProcessed => "file_processed",
            AuditEventKind::DuplicateFound => "duplicate_found",
            AuditEventKind::PlanCreated => "plan_created",
            AuditEventKind::PlanExecuted => "plan_executed",
            AuditEventKind::ApplyStarted => "apply_started",
            AuditEventKind::ApplyCompleted => "apply_completed",
            AuditEventKind::ApplyFailed => "apply_failed",
            AuditEventKind::FileDeleted => "file_deleted",
            AuditEventKind::FileMoved => "file_moved",
            AuditEventKind::FileCopied => "file_copied",
            AuditEventKind::FileHardlinked => "file_hardlinked",
            AuditEventKind::BackupCreated => "backup_created",
            AuditEventKind::BackupRestored => "backup_restored",
            AuditEventKind::BackupFailed => "backup_failed",
            AuditEventKind::RollbackStarted => "rollback_started",
            AuditEventKind::RollbackCompleted => "rollback_completed",
            AuditEventKind::RollbackFailed => "rollback_failed",
            AuditEventKind::RollbackOperationStarted => "rollback_operation_started",
            AuditEventKind::RollbackOperationCompleted => "rollback_operation_completed",
            AuditEventKind::RollbackOperationFailed => "rollback_operation_failed",
            AuditEventKind::UserConfirmation => "user_confirmation",
            AuditEventKind::SystemError => "system_error",
        }
    }

    /// Whether this kind closes out a preceding `*_started` event, for the
    /// startup reconciliation sweep.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuditEventKind::ScanCompleted
                | AuditEventKind::ScanFailed
                | AuditEventKind::ScanCancelled
                | AuditEventKind::ApplyCompleted
                | AuditEventKind::ApplyFailed
                | AuditEventKind::RollbackCompleted
                | AuditEventKind::RollbackFailed
                | AuditEventKind::RollbackOperationCompleted
                | AuditEventKind::RollbackOperationFailed
                | AuditEventKind::BackupFailed
        )
    }
}

/// Append-only structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_kind: AuditEventKind,
    pub payload: serde_json::Value,
}

impl AuditEvent {
    pub fn new(timestamp: String, event_kind: AuditEventKind, payload: serde_json::Value) -> Self {
        AuditEvent {
            timestamp,
            event_kind,
            payload,
        }
    }
}
