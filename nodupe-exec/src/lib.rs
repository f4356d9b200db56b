//! The executor: the trust boundary of NoDupeLabs. Applies plan actions
//! through reversible operations with write-ahead audit, pre-change
//! backups, and a persisted undo stack.
//!
//! Locking follows a scoped-acquisition, at-most-once-effect discipline; the
//! `zip` crate (see `DESIGN.md`) backs self-describing backup archives,
//! keeping data and manifest metadata in separate entries.

mod audit;
mod backup;
mod error;
mod executor;
mod reversible;
mod rollback;
mod stack;

pub use audit::AuditLog;
pub use backup::{read_manifest, restore_archive, verify_archive, write_archive, BackupManager};
pub use error::ExecError;
pub use executor::{
    build_confirmation_summary, execute_plan, verify_plan_fresh, ConfirmationSummary, ExecSummary,
    LARGE_OPERATION_BYTES, LARGE_OPERATION_FILE_COUNT,
};
pub use reversible::{ArchiveCapture, DeleteCapture, RelocateCapture, ReversibleOperation};
pub use rollback::{rollback_all, rollback_last, rollback_to};
pub use stack::OperationStack;
