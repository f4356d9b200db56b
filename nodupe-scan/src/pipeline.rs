use std::collections::HashMap;
use std::path::PathBuf;
use std::thread;

use nodupe_catalog::Catalog;
use nodupe_config::WorkerPoolConfig;
use nodupe_types::{FileRecord, ScanSessionStatus};

use crate::cancel::CancellationToken;
use crate::error::ScanError;
use crate::filter::{filter_entries, FilterOptions};
use crate::walk::{walk_roots, WalkEntry};

/// Inputs to a single `scan` invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub roots: Vec<PathBuf>,
    pub filter: FilterOptions,
    pub exclude: Vec<String>,
    pub include_hidden: bool,
    pub head_bytes: usize,
    pub full_chunk: usize,
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            roots: Vec::new(),
            filter: FilterOptions::default(),
            exclude: Vec::new(),
            include_hidden: true,
            head_bytes: nodupe_config::DEFAULT_HEAD_HASH_BYTES,
            full_chunk: nodupe_config::DEFAULT_FULL_HASH_CHUNK,
            batch_size: nodupe_config::DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub session_id: i64,
    pub files_seen: u64,
    pub files_hashed: u64,
    pub bytes_hashed: u64,
    pub duplicate_groups_linked: u64,
    pub cancelled: bool,
    pub errors: Vec<String>,
}

/// Generic bounded worker pool: spawns `workers` threads, each pulling from
/// `rx` and pushing one result per item into `tx`, until `rx` is exhausted.
/// Used for both the head-hash and full-hash phases.
fn run_worker_pool<T, R, F>(workers: usize, rx: crossbeam_channel::Receiver<T>, f: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let f = std::sync::Arc::new(f);
    let (result_tx, result_rx) = crossbeam_channel::unbounded();

    let handles: Vec<_> = (0..workers.max(1))
        .map(|_| {
            let rx = rx.clone();
            let result_tx = result_tx.clone();
            let f = f.clone();
            thread::spawn(move || {
                for item in rx.iter() {
                    let _ = result_tx.send(f(item));
                }
            })
        })
        .collect();
    drop(result_tx);

    let results = result_rx.iter().collect();
    for h in handles {
        let _ = h.join();
    }
    results
}

struct HashedCandidate {
    entry: WalkEntry,
    head_hash: Option<String>,
    full_hash: Option<String>,
    hash_failed: bool,
}

/// Runs the full scan → fingerprint → group pipeline: walk, filter,
/// progressive hash, batched persist, then a deterministic link pass over
/// the resulting duplicate groups.
///
/// Takes ownership of `catalog` (it becomes the pipeline's single writer for
/// the run's duration, mirroring the "one persister thread" design) and
/// hands it back alongside the summary.
pub fn run(
    mut catalog: Catalog,
    options: ScanOptions,
    pool: WorkerPoolConfig,
    cancel: CancellationToken,
    now: i64,
) -> Result<(Catalog, ScanSummary), ScanError> {
    let roots_str: Vec<String> = options
        .roots
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    let session_id = catalog.start_scan_session(&roots_str, now)?;

    log::info!("scan session {session_id} started over {roots_str:?}");

    let existing: HashMap<String, FileRecord> = catalog
        .all_active_files()?
        .into_iter()
        .map(|r| (r.path.clone(), r))
        .collect();

    // Walk + filter: drained eagerly so the hash stage can apply the
    // size-bucket shortcut, which needs to know every filtered file's size
    // up front.
    let (walk_tx, walk_rx) = crossbeam_channel::bounded(pool.queue_size);
    let (filter_tx, filter_rx) = crossbeam_channel::bounded(pool.queue_size);

    let walker_cancel = cancel.clone();
    let walker_roots = options.roots.clone();
    let walker_exclude = options.exclude.clone();
    let include_hidden = options.include_hidden;
    let walker_handle = thread::spawn(move || {
        walk_roots(&walker_roots, walker_exclude, include_hidden, walker_cancel, walk_tx)
    });

    let filter_cancel = cancel.clone();
    let filter_options = options.filter.clone();
    let filter_handle =
        thread::spawn(move || filter_entries(&filter_options, filter_cancel, walk_rx, filter_tx));

    let mut entries = Vec::new();
    for entry in filter_rx.iter() {
        entries.push(entry);
        if cancel.is_cancelled() {
            break;
        }
    }
    // Drop the receiver before joining: if cancellation broke out of the
    // loop early, upstream threads blocked on a full bounded channel need
    // their send to fail so they can observe cancellation and exit.
    drop(filter_rx);

    let mut walk_errors = walker_handle.join().unwrap_or_default();
    let _rejected = filter_handle.join().unwrap_or(0);

    let files_seen = entries.len() as u64;

    // Partition: unchanged-since-last-scan entries skip hashing entirely;
    // everything else is a hash candidate.
    let mut unchanged: Vec<FileRecord> = Vec::new();
    let mut candidates: Vec<WalkEntry> = Vec::new();
    let mut reused: HashMap<PathBuf, FileRecord> = HashMap::new();

    for entry in entries {
        match existing.get(&entry.path.display().to_string()) {
            Some(existing_record)
                if existing_record.size == entry.size
                    && existing_record.modified_time == entry.mtime =>
            {
                unchanged.push(existing_record.clone());
            }
            Some(existing_record) => {
                reused.insert(entry.path.clone(), existing_record.clone());
                candidates.push(entry);
            }
            None => candidates.push(entry),
        }
    }

    // Size-bucket shortcut: singleton sizes are trivially unique.
    let mut size_counts: HashMap<u64, usize> = HashMap::new();
    for c in &candidates {
        *size_counts.entry(c.size).or_insert(0) += 1;
    }

    let mut singleton_records: Vec<FileRecord> = Vec::new();
    let mut bucketed: Vec<WalkEntry> = Vec::new();
    for c in candidates {
        if size_counts.get(&c.size).copied().unwrap_or(0) < 2 {
            singleton_records.push(discovered_record(&c, now));
        } else {
            bucketed.push(c);
        }
    }

    // Phase: head hash over every non-singleton candidate.
    let mut bytes_hashed = 0u64;
    let head_bytes = options.head_bytes;
    let (work_tx, work_rx) = crossbeam_channel::unbounded();
    for entry in bucketed {
        let _ = work_tx.send(entry);
    }
    drop(work_tx);

    let quick_cancel = cancel.clone();
    let quick_results = run_worker_pool(pool.max_workers, work_rx, move |entry: WalkEntry| {
        if quick_cancel.is_cancelled() {
            return HashedCandidate {
                entry,
                head_hash: None,
                full_hash: None,
                hash_failed: true,
            };
        }
        match nodupe_hash::quick_hash(&entry.path, head_bytes) {
            Ok(hash) => HashedCandidate {
                entry,
                head_hash: Some(hash),
                full_hash: None,
                hash_failed: false,
            },
            Err(err) => {
                log::warn!("failed to hash {:?}: {err}", entry.path);
                HashedCandidate {
                    entry,
                    head_hash: None,
                    full_hash: None,
                    hash_failed: true,
                }
            }
        }
    });

    // Bucket by (size, head_hash) to find files needing a full-content pass.
    let mut head_counts: HashMap<(u64, String), usize> = HashMap::new();
    for c in &quick_results {
        if let Some(h) = &c.head_hash {
            *head_counts.entry((c.entry.size, h.clone())).or_insert(0) += 1;
        }
    }

    let mut finished: Vec<HashedCandidate> = Vec::new();
    let mut needs_full: Vec<HashedCandidate> = Vec::new();
    for c in quick_results {
        if c.hash_failed || c.head_hash.is_none() {
            finished.push(c);
            continue;
        }
        let key = (c.entry.size, c.head_hash.clone().unwrap());
        // A file smaller than the head window was fully covered already;
        // quick_hash degenerates to full_hash in that case.
        let fully_covered = c.entry.size <= head_bytes as u64;
        if fully_covered {
            let head = c.head_hash.clone();
            finished.push(HashedCandidate {
                full_hash: head,
                ..c
            });
        } else if head_counts.get(&key).copied().unwrap_or(0) >= 2 {
            needs_full.push(c);
        } else {
            finished.push(c);
        }
    }

    let full_chunk = options.full_chunk;
    let (full_tx, full_rx) = crossbeam_channel::unbounded();
    for c in needs_full {
        let _ = full_tx.send(c);
    }
    drop(full_tx);

    let full_cancel = cancel.clone();
    let full_results = run_worker_pool(pool.max_workers, full_rx, move |c: HashedCandidate| {
        if full_cancel.is_cancelled() {
            return HashedCandidate {
                hash_failed: true,
                ..c
            };
        }
        match nodupe_hash::full_hash(&c.entry.path, full_chunk) {
            Ok(hash) => HashedCandidate {
                full_hash: Some(hash),
                ..c
            },
            Err(err) => {
                log::warn!("failed to fully hash {:?}: {err}", c.entry.path);
                HashedCandidate {
                    hash_failed: true,
                    ..c
                }
            }
        }
    });

    finished.extend(full_results);

    let mut files_hashed = 0u64;
    let mut new_records: Vec<FileRecord> = Vec::new();
    let mut updated_records: Vec<FileRecord> = Vec::new();

    for c in finished {
        if c.head_hash.is_some() || c.full_hash.is_some() {
            files_hashed += 1;
            bytes_hashed += c.entry.size;
        }
        let path_key = c.entry.path.clone();
        if let Some(mut prior) = reused.remove(&path_key) {
            prior.size = c.entry.size;
            prior.modified_time = c.entry.mtime;
            prior.head_hash = c.head_hash;
            prior.full_hash = c.full_hash;
            prior.hash_failed = c.hash_failed;
            prior.updated_at = now;
            updated_records.push(prior);
        } else {
            let mut record = discovered_record(&c.entry, now);
            record.head_hash = c.head_hash;
            record.full_hash = c.full_hash;
            record.hash_failed = c.hash_failed;
            new_records.push(record);
        }
    }

    new_records.extend(singleton_records);

    // Persist stage: batched, checking cancellation between batches so a
    // cancelled scan still leaves a consistent, partially-applied catalog.
    for chunk in new_records.chunks(options.batch_size) {
        catalog.batch_add_files(chunk)?;
        if cancel.is_cancelled() {
            break;
        }
    }
    for record in &updated_records {
        catalog.update_file(record)?;
        if cancel.is_cancelled() {
            break;
        }
    }

    catalog.update_scan_session_progress(session_id, files_seen, files_hashed, bytes_hashed)?;

    let cancelled = cancel.is_cancelled();
    let mut duplicate_groups_linked = 0u64;

    if !cancelled {
        duplicate_groups_linked = link_duplicates(&mut catalog)?;
    }

    let status = if cancelled {
        ScanSessionStatus::Cancelled
    } else {
        ScanSessionStatus::Completed
    };
    catalog.finish_scan_session(session_id, status, now)?;

    let mut errors = Vec::new();
    errors.append(&mut walk_errors);

    log::info!(
        "scan session {session_id} finished: seen={files_seen} hashed={files_hashed} \
         cancelled={cancelled}"
    );

    Ok((
        catalog,
        ScanSummary {
            session_id,
            files_seen,
            files_hashed,
            bytes_hashed,
            duplicate_groups_linked,
            cancelled,
            errors,
        },
    ))
}

fn discovered_record(entry: &WalkEntry, now: i64) -> FileRecord {
    FileRecord::new_discovered(entry.path.display().to_string(), entry.size, entry.mtime, now)
}

/// Link pass: for every duplicate-hash group, sort by path for a
/// deterministic initial keeper, mark it original and the rest duplicates.
/// Re-running this after a previous scan re-derives the assignment, which
/// is how idempotent re-scans stay convergent.
fn link_duplicates(catalog: &mut Catalog) -> Result<u64, ScanError> {
    let hashes = catalog.duplicate_hashes()?;
    let mut linked = 0u64;

    for hash in hashes {
        let mut group = catalog.find_duplicates_by_hash(&hash)?;
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| a.path.cmp(&b.path));
        let keeper = &group[0];
        if keeper.is_duplicate {
            catalog.mark_as_original(keeper.id)?;
        }
        let non_keeper_ids: Vec<_> = group[1..].iter().map(|r| r.id).collect();
        catalog.batch_mark_as_duplicate(&non_keeper_ids, keeper.id)?;
        linked += 1;
    }

    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn pool() -> WorkerPoolConfig {
        WorkerPoolConfig {
            workers: 2,
            max_workers: 4,
            queue_size: 64,
        }
    }

    fn write(dir: &TempDir, name: &str, content: &[u8]) {
        fs::File::create(dir.path().join(name)).unwrap().write_all(content).unwrap();
    }

    #[test]
    fn run_links_identical_files_into_one_duplicate_group() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"same bytes");
        write(&dir, "b.txt", b"same bytes");
        write(&dir, "c.txt", b"different");

        let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
        let options = ScanOptions {
            roots: vec![dir.path().to_path_buf()],
            ..ScanOptions::default()
        };
        let (mut catalog, summary) =
            run(catalog, options, pool(), CancellationToken::new(), 1000).unwrap();

        assert_eq!(summary.files_seen, 3);
        assert!(!summary.cancelled);
        assert_eq!(summary.duplicate_groups_linked, 1);
        assert_eq!(catalog.count_duplicates().unwrap(), 1);
        assert_eq!(catalog.duplicate_hashes().unwrap().len(), 1);
    }

    #[test]
    fn rescan_without_filesystem_changes_is_idempotent() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"same bytes");
        write(&dir, "b.txt", b"same bytes");

        let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
        let options = || ScanOptions {
            roots: vec![dir.path().to_path_buf()],
            ..ScanOptions::default()
        };
        let (catalog, first) =
            run(catalog, options(), pool(), CancellationToken::new(), 1000).unwrap();
        assert_eq!(first.duplicate_groups_linked, 1);

        let (catalog, second) =
            run(catalog, options(), pool(), CancellationToken::new(), 2000).unwrap();
        assert_eq!(second.duplicate_groups_linked, 1);
        assert_eq!(catalog.all_active_files().unwrap().len(), 2);
    }

    #[test]
    fn zero_byte_files_are_treated_as_duplicates_of_each_other() {
        let dir = TempDir::new().unwrap();
        write(&dir, "empty1.txt", b"");
        write(&dir, "empty2.txt", b"");

        let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
        let options = ScanOptions {
            roots: vec![dir.path().to_path_buf()],
            ..ScanOptions::default()
        };
        let (catalog, summary) =
            run(catalog, options, pool(), CancellationToken::new(), 1000).unwrap();

        assert_eq!(summary.files_seen, 2);
        assert_eq!(catalog.count_duplicates().unwrap(), 1);
    }

    #[test]
    fn pre_cancelled_token_yields_a_cancelled_session_with_consistent_records() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.txt", b"some content");
        write(&dir, "b.txt", b"some content");

        let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
        let options = ScanOptions {
            roots: vec![dir.path().to_path_buf()],
            ..ScanOptions::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (catalog, summary) = run(catalog, options, pool(), cancel, 1000).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.duplicate_groups_linked, 0);

        for record in catalog.all_active_files().unwrap() {
            assert!(record.full_hash.is_some() || record.hash_failed || record.head_hash.is_none());
        }
    }
}
