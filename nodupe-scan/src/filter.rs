use crossbeam_channel::{Receiver, Sender};

use crate::cancel::CancellationToken;
use crate::walk::WalkEntry;

/// Inclusion predicate on `(size >= min, size <= max, extension in allowed,
/// path not excluded)`. Rejected files are not enqueued further.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub extensions: Option<Vec<String>>,
}

impl FilterOptions {
    fn accepts(&self, entry: &WalkEntry) -> bool {
        if let Some(min) = self.min_size {
            if entry.size < min {
                return false;
            }
        }
        if let Some(max) = self.max_size {
            if entry.size > max {
                return false;
            }
        }
        if let Some(allowed) = &self.extensions {
            let ext = entry
                .path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            if !allowed.iter().any(|a| a.eq_ignore_ascii_case(ext)) {
                return false;
            }
        }
        true
    }
}

/// Drains `rx`, applying `options`, and forwards accepted entries to `tx`.
/// Runs on its own thread; returns the number of rejected entries.
pub fn filter_entries(
    options: &FilterOptions,
    cancel: CancellationToken,
    rx: Receiver<WalkEntry>,
    tx: Sender<WalkEntry>,
) -> u64 {
    let mut rejected = 0;

    for entry in rx.iter() {
        if cancel.is_cancelled() {
            break;
        }

        if !options.accepts(&entry) {
            rejected += 1;
            continue;
        }

        if tx.send(entry).is_err() {
            break;
        }
    }

    rejected
}
