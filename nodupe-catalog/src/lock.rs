use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use nix::fcntl::{flock, FlockArg};

use crate::error::CatalogError;

/// Advisory cross-process lock guarding the catalog's writer. Mirrors the
/// teacher's `ChunkStore`/`ProcessLocker` guaranteed-release-on-all-exit-paths
/// contract: acquisition is scoped, and `Drop` always unlocks.
pub struct WriteLock {
    _file: File,
    path: PathBuf,
}

impl WriteLock {
    /// Blocks until the exclusive lock on `path` is available.
    pub fn acquire(path: &Path) -> Result<Self, CatalogError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(CatalogError::Io)?;

        flock(file.as_raw_fd(), FlockArg::LockExclusive)
            .map_err(|e| CatalogError::Connection(format!("failed to lock {path:?}: {e}")))?;

        log::debug!("acquired catalog write lock at {path:?}");

        Ok(WriteLock {
            _file: file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = flock(self._file.as_raw_fd(), FlockArg::Unlock) {
            log::warn!("failed to release catalog write lock at {:?}: {e}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_and_release_roundtrip() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join(".nodupe.lock");
        {
            let _lock = WriteLock::acquire(&lock_path).unwrap();
        }
        // released on drop; acquiring again must succeed immediately.
        let _lock2 = WriteLock::acquire(&lock_path).unwrap();
    }
}
