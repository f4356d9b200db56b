use nodupe_catalog::CatalogError;
use nodupe_exec::ExecError;
use nodupe_plan::PlanError;
use nodupe_scan::ScanError;

/// Maps a command's top-level error to a process exit code. Each library
/// crate keeps its own narrow `thiserror` enum; this is the one place those
/// enums get collapsed into an exit code, the usual boundary-conversion
/// shape between library crates (`thiserror`) and a binary (`anyhow`).
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<CatalogError>() {
        log::error!("catalog error: {e}");
        return 2;
    }
    if let Some(e) = err.downcast_ref::<ScanError>() {
        log::error!("scan error: {e}");
        return 2;
    }
    if let Some(e) = err.downcast_ref::<PlanError>() {
        log::error!("plan error: {e}");
        return 1;
    }
    if let Some(e) = err.downcast_ref::<ExecError>() {
        return match e {
            ExecError::PlanStale { .. } => 1,
            ExecError::Catalog(_) | ExecError::BackupFailed(_) | ExecError::OperationFailed(_) | ExecError::UndoFailed(_) => 2,
            _ => 2,
        };
    }
    // Everything else: bad args, missing paths, malformed plan files,
    // anyhow::Error::msg from an invalid --strategy string.
    1
}
