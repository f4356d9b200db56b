//! Base directory resolution, worker-pool tuning and the on-disk layout
//! shared by every NoDupeLabs command.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Error};

/// Catalog file name, relative to the base dir.
pub const CATALOG_FILE: &str = "catalog.db";
/// Human-readable audit sink, relative to the base dir.
pub const AUDIT_LOG_FILE: &str = "audit.log";
/// Machine-parseable audit sink, relative to the base dir.
pub const AUDIT_JSONL_FILE: &str = "audit.jsonl";
/// Staging area DeleteFile moves targets into.
pub const TRASH_DIR: &str = ".nodupe-trash";
/// Pre-apply snapshot archives.
pub const BACKUPS_DIR: &str = ".nodupe-backups";
/// Persisted OperationStack.
pub const STACK_FILE: &str = ".nodupe-stack.json";
/// Advisory cross-process write lock.
pub const LOCK_FILE: &str = ".nodupe.lock";

/// Default worker pool tuning; overridable via [`WorkerPoolConfig`].
pub const DEFAULT_HEAD_HASH_BYTES: usize = 65_536;
pub const DEFAULT_FULL_HASH_CHUNK: usize = 4096;
pub const DEFAULT_BATCH_SIZE: usize = 512;
pub const DEFAULT_QUEUE_SIZE: usize = 1024;
pub const DEFAULT_STACK_LIMIT: usize = 100;
pub const DEFAULT_POOL_TIMEOUT_SECS: u64 = 5;

/// Resolves and lays out the base directory every persisted artifact lives
/// under: catalog, audit logs, trash, backups, operation stack.
///
/// Resolution order follows `--base-dir` > `NODUPE_BASE_DIR` > cwd, the usual
/// flag-over-env-over-default precedence for a configuration directory.
#[derive(Debug, Clone)]
pub struct BaseDir {
    root: PathBuf,
}

impl BaseDir {
    pub fn resolve(cli_override: Option<&Path>) -> Result<Self, Error> {
        let root = if let Some(p) = cli_override {
            p.to_path_buf()
        } else if let Ok(env_path) = env::var("NODUPE_BASE_DIR") {
            PathBuf::from(env_path)
        } else {
            env::current_dir()?
        };

        if !root.exists() {
            bail!("base directory {root:?} does not exist");
        }

        Ok(BaseDir { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join(AUDIT_LOG_FILE)
    }

    pub fn audit_jsonl_path(&self) -> PathBuf {
        self.root.join(AUDIT_JSONL_FILE)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.root.join(TRASH_DIR)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    pub fn stack_path(&self) -> PathBuf {
        self.root.join(STACK_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// Creates the hidden subdirectories a fresh base dir needs. Idempotent.
    pub fn ensure_layout(&self) -> Result<(), Error> {
        std::fs::create_dir_all(self.trash_dir())?;
        std::fs::create_dir_all(self.backups_dir())?;
        Ok(())
    }
}

/// Recognized worker-pool tuning options: `workers`, `max_workers`,
/// `queue_size`.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub max_workers: usize,
    pub queue_size: usize,
}

impl WorkerPoolConfig {
    /// `workers` defaults to the logical CPU count; `max_workers` doubles
    /// it. The core always runs with real OS threads, so the cap is always
    /// applied.
    pub fn from_env_or_default(workers: Option<usize>, queue_size: Option<usize>) -> Self {
        let cores = num_cpus::get().max(1);
        let workers = workers.unwrap_or(cores);
        WorkerPoolConfig {
            workers,
            max_workers: workers * 2,
            queue_size: queue_size.unwrap_or(DEFAULT_QUEUE_SIZE),
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::from_env_or_default(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_defaults_to_cwd() {
        let base = BaseDir::resolve(None).unwrap();
        assert_eq!(base.root(), env::current_dir().unwrap());
    }

    #[test]
    fn resolve_rejects_missing_override() {
        let err = BaseDir::resolve(Some(Path::new("/nonexistent/nodupe/base"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn worker_pool_doubles_for_max() {
        let cfg = WorkerPoolConfig::from_env_or_default(Some(4), None);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.max_workers, 8);
    }
}
