use serde::{Deserialize, Serialize};

pub type ScanSessionId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanSessionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Audit entity for a single scan invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: ScanSessionId,
    pub roots: Vec<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub files_seen: u64,
    pub files_hashed: u64,
    pub bytes_hashed: u64,
    pub status: ScanSessionStatus,
}

impl ScanSession {
    pub fn start(id: ScanSessionId, roots: Vec<String>, started_at: i64) -> Self {
        ScanSession {
            id,
            roots,
            started_at,
            finished_at: None,
            files_seen: 0,
            files_hashed: 0,
            bytes_hashed: 0,
            status: ScanSessionStatus::Running,
        }
    }
}
