use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crossbeam_channel::Sender;
use walkdir::WalkDir;

use crate::cancel::CancellationToken;

/// One filesystem entry discovered by the walker, before filtering.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: i64,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn excluded(entry: &walkdir::DirEntry, exclude: &[String]) -> bool {
    let name = entry.file_name().to_str().unwrap_or("");
    exclude.iter().any(|pattern| name == pattern)
}

/// Depth-first enumeration of `roots`. Symlinks are not followed. Excluded
/// directory patterns are matched against path components. Hidden entries
/// are included unless `include_hidden` is false. Directory read errors are
/// logged and that subtree is skipped; the walk as a whole continues.
///
/// Runs on its own thread, sending into the bounded `tx` channel that the
/// filter stage drains; returns once every root has been walked, the
/// channel's receiver is dropped, or `cancel` is observed.
pub fn walk_roots(
    roots: &[PathBuf],
    exclude: Vec<String>,
    include_hidden: bool,
    cancel: CancellationToken,
    tx: Sender<WalkEntry>,
) -> Vec<String> {
    let mut errors = Vec::new();

    for root in roots {
        if cancel.is_cancelled() {
            break;
        }

        let walker = WalkDir::new(root).follow_links(false).into_iter();

        for entry in walker.filter_entry(|e| {
            if !include_hidden && is_hidden(e) {
                return false;
            }
            !excluded(e, &exclude)
        }) {
            if cancel.is_cancelled() {
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.clone());
                    log::warn!("walker skipping subtree at {path:?}: {err}");
                    errors.push(format!("{path:?}: {err}"));
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    log::warn!("failed to stat {:?}: {err}", entry.path());
                    errors.push(format!("{:?}: {err}", entry.path()));
                    continue;
                }
            };

            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            let walk_entry = WalkEntry {
                path: entry.into_path(),
                size: meta.len(),
                mtime,
            };

            if tx.send(walk_entry).is_err() {
                // receiver gone: downstream cancelled or errored out.
                return errors;
            }
        }
    }

    errors
}
