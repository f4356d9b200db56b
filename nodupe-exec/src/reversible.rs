use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Picks a collision-free path under `dir` for `name`, using a
/// microsecond-precision timestamp and falling back to an integer suffix if
/// that still collides.
fn unique_path(dir: &Path, name: &str, suffix: &str) -> PathBuf {
    let micros = chrono::Utc::now().timestamp_micros();
    let mut candidate = dir.join(format!("{name}.{suffix}.{micros}"));
    let mut attempt = 0u32;
    while candidate.exists() {
        attempt += 1;
        candidate = dir.join(format!("{name}.{suffix}.{micros}.{attempt}"));
    }
    candidate
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Copies `src` over an existing `dst`, first relocating `dst` to a
/// timestamped backup path so the operation can restore it on undo. Returns
/// the backup path if `dst` existed.
fn backup_if_exists(dst: &Path) -> Result<Option<PathBuf>, ExecError> {
    if !dst.exists() {
        return Ok(None);
    }
    let dir = dst.parent().unwrap_or_else(|| Path::new("."));
    let backup = unique_path(dir, &file_name_of(dst), "backup");
    fs::rename(dst, &backup).map_err(|e| ExecError::io(dst.display().to_string(), e))?;
    Ok(Some(backup))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCapture {
    pub trashed_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelocateCapture {
    pub dst_existed: bool,
    pub backup_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveCapture {
    pub originals_deleted: bool,
}

/// Closed sum type over the operation kinds the executor runs: add a kind
/// only by adding an arm plus its inverse. Serializable so a
/// pending/committed entry survives as the `OperationStack`'s persisted
/// forward/inverse parameters across process invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReversibleOperation {
    DeleteFile {
        path: PathBuf,
        trash_dir: PathBuf,
        captured: Option<DeleteCapture>,
    },
    MoveFile {
        src: PathBuf,
        dst: PathBuf,
        captured: Option<RelocateCapture>,
    },
    CopyFile {
        src: PathBuf,
        dst: PathBuf,
        captured: Option<RelocateCapture>,
    },
    HardlinkFile {
        src: PathBuf,
        dst: PathBuf,
        captured: Option<RelocateCapture>,
    },
    ArchiveFiles {
        paths: Vec<PathBuf>,
        archive_path: PathBuf,
        delete_originals: bool,
        captured: Option<ArchiveCapture>,
    },
}

impl ReversibleOperation {
    pub fn describe(&self) -> String {
        match self {
            ReversibleOperation::DeleteFile { path, .. } => format!("delete {}", path.display()),
            ReversibleOperation::MoveFile { src, dst, .. } => {
                format!("move {} -> {}", src.display(), dst.display())
            }
            ReversibleOperation::CopyFile { src, dst, .. } => {
                format!("copy {} -> {}", src.display(), dst.display())
            }
            ReversibleOperation::HardlinkFile { src, dst, .. } => {
                format!("hardlink {} -> {}", dst.display(), src.display())
            }
            ReversibleOperation::ArchiveFiles { paths, archive_path, .. } => {
                format!("archive {} files -> {}", paths.len(), archive_path.display())
            }
        }
    }

    /// Performs the operation, capturing whatever state `undo` will need.
    /// Each arm must run exactly once, at-most-one-effect: callers never
    /// retry a partially-executed variant, they treat the error as final
    /// and move on via the `OperationStack`.
    pub fn execute(&mut self) -> Result<(), ExecError> {
        match self {
            ReversibleOperation::DeleteFile { path, trash_dir, captured } => {
                fs::create_dir_all(trash_dir).map_err(|e| ExecError::io(trash_dir.display().to_string(), e))?;
                let trashed_path = unique_path(trash_dir, &file_name_of(path), "trash");
                fs::rename(&path, &trashed_path).map_err(|e| ExecError::io(path.display().to_string(), e))?;
                *captured = Some(DeleteCapture { trashed_path });
                Ok(())
            }
            ReversibleOperation::MoveFile { src, dst, captured } => {
                if let Some(parent) = dst.parent() {
                    fs::create_dir_all(parent).map_err(|e| ExecError::io(parent.display().to_string(), e))?;
                }
                let dst_existed = dst.exists();
                let backup_path = backup_if_exists(dst)?;
                fs::rename(&src, &dst).map_err(|e| ExecError::io(src.display().to_string(), e))?;
                *captured = Some(RelocateCapture { dst_existed, backup_path });
                Ok(())
            }
            ReversibleOperation::CopyFile { src, dst, captured } => {
                if let Some(parent) = dst.parent() {
                    fs::create_dir_all(parent).map_err(|e| ExecError::io(parent.display().to_string(), e))?;
                }
                let dst_existed = dst.exists();
                let backup_path = backup_if_exists(dst)?;
                fs::copy(&src, &dst).map_err(|e| ExecError::io(src.display().to_string(), e))?;
                *captured = Some(RelocateCapture { dst_existed, backup_path });
                Ok(())
            }
            ReversibleOperation::HardlinkFile { src, dst, captured } => {
                if let Some(parent) = dst.parent() {
                    fs::create_dir_all(parent).map_err(|e| ExecError::io(parent.display().to_string(), e))?;
                }
                let dst_existed = dst.exists();
                let backup_path = backup_if_exists(dst)?;
                fs::hard_link(&src, &dst).map_err(|e| ExecError::io(dst.display().to_string(), e))?;
                *captured = Some(RelocateCapture { dst_existed, backup_path });
                Ok(())
            }
            ReversibleOperation::ArchiveFiles {
                paths,
                archive_path,
                delete_originals,
                captured,
            } => {
                crate::backup::write_archive(archive_path, None, paths)?;
                if *delete_originals {
                    for p in paths.iter() {
                        fs::remove_file(p).map_err(|e| ExecError::io(p.display().to_string(), e))?;
                    }
                }
                *captured = Some(ArchiveCapture {
                    originals_deleted: *delete_originals,
                });
                Ok(())
            }
        }
    }

    /// Reverses a previously-executed operation using its captured state.
    pub fn undo(&self) -> Result<(), ExecError> {
        match self {
            ReversibleOperation::DeleteFile { path, captured, .. } => {
                let captured = captured
                    .as_ref()
                    .ok_or_else(|| ExecError::UndoFailed("delete was never executed".into()))?;
                fs::rename(&captured.trashed_path, path)
                    .map_err(|e| ExecError::io(captured.trashed_path.display().to_string(), e))
            }
            ReversibleOperation::MoveFile { src, dst, captured } => {
                let captured = captured
                    .as_ref()
                    .ok_or_else(|| ExecError::UndoFailed("move was never executed".into()))?;
                fs::rename(&dst, &src).map_err(|e| ExecError::io(dst.display().to_string(), e))?;
                restore_backup(dst, captured)
            }
            ReversibleOperation::CopyFile { dst, captured, .. } => {
                let captured = captured
                    .as_ref()
                    .ok_or_else(|| ExecError::UndoFailed("copy was never executed".into()))?;
                if dst.exists() {
                    fs::remove_file(dst).map_err(|e| ExecError::io(dst.display().to_string(), e))?;
                }
                restore_backup(dst, captured)
            }
            ReversibleOperation::HardlinkFile { dst, captured, .. } => {
                let captured = captured
                    .as_ref()
                    .ok_or_else(|| ExecError::UndoFailed("hardlink was never executed".into()))?;
                if dst.exists() {
                    fs::remove_file(dst).map_err(|e| ExecError::io(dst.display().to_string(), e))?;
                }
                restore_backup(dst, captured)
            }
            ReversibleOperation::ArchiveFiles {
                paths,
                archive_path,
                captured,
                ..
            } => {
                let captured = captured
                    .as_ref()
                    .ok_or_else(|| ExecError::UndoFailed("archive was never executed".into()))?;
                if captured.originals_deleted {
                    crate::backup::restore_archive(archive_path, paths)?;
                }
                Ok(())
            }
        }
    }
}

fn restore_backup(dst: &Path, captured: &RelocateCapture) -> Result<(), ExecError> {
    if let Some(backup) = &captured.backup_path {
        fs::rename(backup, dst).map_err(|e| ExecError::io(backup.display().to_string(), e))?;
    } else if captured.dst_existed {
        return Err(ExecError::UndoFailed(format!(
            "{} existed before but no backup was captured",
            dst.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        let mut f = File::create(path).unwrap();
        f.write_all(content).unwrap();
    }

    #[test]
    fn delete_then_undo_restores_original_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        write_file(&path, b"hello");
        let trash = dir.path().join("trash");

        let mut op = ReversibleOperation::DeleteFile {
            path: path.clone(),
            trash_dir: trash,
            captured: None,
        };
        op.execute().unwrap();
        assert!(!path.exists());

        op.undo().unwrap();
        assert!(path.exists());
        assert_eq!(fs::read(&path).unwrap(), b"hello");
    }

    #[test]
    fn move_over_existing_dst_backs_up_and_restores() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        write_file(&src, b"new");
        write_file(&dst, b"old");

        let mut op = ReversibleOperation::MoveFile {
            src: src.clone(),
            dst: dst.clone(),
            captured: None,
        };
        op.execute().unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"new");
        assert!(!src.exists());

        op.undo().unwrap();
        assert_eq!(fs::read(&src).unwrap(), b"new");
        assert_eq!(fs::read(&dst).unwrap(), b"old");
    }

    #[test]
    fn hardlink_then_undo_removes_link_and_restores_backup() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        write_file(&src, b"content");
        write_file(&dst, b"previous");

        let mut op = ReversibleOperation::HardlinkFile {
            src: src.clone(),
            dst: dst.clone(),
            captured: None,
        };
        op.execute().unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"content");

        op.undo().unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"previous");
    }
}
