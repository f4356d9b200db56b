use serde::{Deserialize, Serialize};

/// Kind of a [`OperationRecord`]; mirrors the `ReversibleOperation` variants
/// the executor actually runs, plus `PlanApply` which groups a whole apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Delete,
    Move,
    Copy,
    Hardlink,
    Archive,
    PlanApply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Committed,
    Failed,
    Undone,
}

/// An entry on the `OperationStack`.
///
/// `forward` and `inverse` are opaque JSON blobs: each `ReversibleOperation`
/// variant knows how to serialize and parse its own parameters, so this type
/// stays agnostic of the variant shapes defined in `nodupe-exec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: u64,
    pub kind: OperationKind,
    pub timestamp: i64,
    pub forward: serde_json::Value,
    pub inverse: serde_json::Value,
    pub correlation_id: String,
    pub status: OperationStatus,
}
