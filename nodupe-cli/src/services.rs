use anyhow::{Context, Result};
use nodupe_catalog::Catalog;
use nodupe_config::BaseDir;
use nodupe_exec::{AuditLog, BackupManager, OperationStack};

/// Process-wide singletons scoped to a single command invocation:
/// constructed once at the entry point and passed explicitly to the
/// components that need them, rather than reached for ambiently from
/// inside the core crates.
pub struct Services {
    pub base_dir: BaseDir,
    pub catalog: Catalog,
    pub audit: AuditLog,
    pub stack: OperationStack,
    pub backups: BackupManager,
}

impl Services {
    pub fn open(base_dir: BaseDir) -> Result<Self> {
        base_dir.ensure_layout().context("preparing base directory layout")?;

        let catalog = Catalog::open(&base_dir.catalog_path())
            .with_context(|| format!("opening catalog at {:?}", base_dir.catalog_path()))?;
        let audit = AuditLog::open(&base_dir.audit_log_path(), &base_dir.audit_jsonl_path())
            .context("opening audit log")?;
        let stack = OperationStack::load(&base_dir.stack_path(), nodupe_config::DEFAULT_STACK_LIMIT)
            .context("loading operation stack")?;
        let backups = BackupManager::new(base_dir.backups_dir());

        Ok(Services {
            base_dir,
            catalog,
            audit,
            stack,
            backups,
        })
    }
}
