//! Walks roots, filters, drives the progressive hasher, batches writes to
//! the catalog, and links duplicate groups.
//!
//! Threads and bounded `crossbeam-channel` queues, not an async runtime —
//! the core is not fundamentally asynchronous; the only real concurrency
//! in NoDupeLabs is this pipeline's worker pools.

mod cancel;
mod error;
mod filter;
mod pipeline;
mod walk;

pub use cancel::CancellationToken;
pub use error::ScanError;
pub use filter::FilterOptions;
pub use pipeline::{run, ScanOptions, ScanSummary};
pub use walk::WalkEntry;
