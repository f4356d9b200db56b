//! Progressive content fingerprinting.
//!
//! Three phases, each cheaper to skip than the last: a singleton size bucket
//! never needs hashing; a unique head hash within a bucket never needs a
//! full read; only files sharing `(size, head_hash)` pay for the full pass.
//! Hash primitive is SHA-256 (`openssl::sha::Sha256`), streamed in fixed
//! chunks so content is never loaded whole.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use openssl::sha::Sha256;
use thiserror::Error;

/// Default head-hash window: first K bytes.
pub const DEFAULT_HEAD_BYTES: usize = 65_536;
/// Default full-hash streaming chunk size.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        HashError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result of the single-call `hash_file` API used by ad-hoc tools: the
/// caller gets size and mtime back alongside the digest so it can populate
/// a `FileRecord` without a second `stat`.
#[derive(Debug, Clone)]
pub struct HashedFile {
    pub hash: String,
    pub size: u64,
    pub mtime: i64,
}

/// Hashes the first `head_bytes` of `path`. If the file is shorter than
/// `head_bytes`, the result covers the whole file (so quick_hash ==
/// full_hash for small files).
pub fn quick_hash(path: &Path, head_bytes: usize) -> Result<String, HashError> {
    let mut file = File::open(path).map_err(|e| HashError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut remaining = head_bytes;
    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE.min(head_bytes.max(1))];

    while remaining > 0 {
        let want = buf.len().min(remaining);
        let read = file
            .read(&mut buf[..want])
            .map_err(|e| HashError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        remaining -= read;
    }

    Ok(hex::encode(hasher.finish()))
}

/// Hashes the entire content of `path`, streaming in fixed-size chunks.
pub fn full_hash(path: &Path, chunk_size: usize) -> Result<String, HashError> {
    let mut file = File::open(path).map_err(|e| HashError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let read = file.read(&mut buf).map_err(|e| HashError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finish()))
}

/// Single-call API: hashes the whole file and reports its size and mtime
/// alongside the digest.
pub fn hash_file(path: &Path, chunk_size: usize) -> Result<HashedFile, HashError> {
    let meta = std::fs::metadata(path).map_err(|e| HashError::io(path, e))?;
    let hash = full_hash(path, chunk_size)?;
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(HashedFile {
        hash,
        size: meta.len(),
        mtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        path
    }

    #[test]
    fn zero_byte_file_hashes_to_fixed_digest() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.bin", b"");
        let b = write_file(&dir, "b.bin", b"");

        let ha = full_hash(&a, DEFAULT_CHUNK_SIZE).unwrap();
        let hb = full_hash(&b, DEFAULT_CHUNK_SIZE).unwrap();

        assert_eq!(ha, hb);
        // SHA-256 of the empty string.
        assert_eq!(
            ha,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn quick_hash_equals_full_hash_for_small_files() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "small.bin", b"hello world");

        let quick = quick_hash(&path, DEFAULT_HEAD_BYTES).unwrap();
        let full = full_hash(&path, DEFAULT_CHUNK_SIZE).unwrap();

        assert_eq!(quick, full);
    }

    #[test]
    fn quick_hash_only_covers_head_window() {
        let dir = TempDir::new().unwrap();
        let mut content = vec![0u8; 128];
        content.extend(vec![1u8; 128]);
        let path = write_file(&dir, "split.bin", &content);

        let head_of_first_half = quick_hash(&path, 64).unwrap();
        let full = full_hash(&path, DEFAULT_CHUNK_SIZE).unwrap();
        assert_ne!(head_of_first_half, full);

        let only_zeroes = write_file(&dir, "zeroes.bin", &vec![0u8; 64]);
        let zero_hash = full_hash(&only_zeroes, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(head_of_first_half, zero_hash);
    }

    #[test]
    fn unreadable_file_produces_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist.bin");
        let err = full_hash(&missing, DEFAULT_CHUNK_SIZE).unwrap_err();
        assert!(matches!(err, HashError::Io { .. }));
    }

    #[test]
    fn hash_file_reports_size() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "sized.bin", b"0123456789");
        let hashed = hash_file(&path, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(hashed.size, 10);
    }
}
