use thiserror::Error;

/// Typed error taxonomy for the trust boundary: every variant maps to a
/// user-visible exit code and audit kind at the `nodupe-cli` boundary, not
/// here.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("catalog error: {0}")]
    Catalog(#[from] nodupe_catalog::CatalogError),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plan is stale: catalog is at version {current}, plan was generated against {plan}")]
    PlanStale { plan: String, current: String },

    #[error("failed to create backup snapshot: {0}")]
    BackupFailed(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("undo failed: {0}")]
    UndoFailed(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ExecError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ExecError::Io {
            path: path.into(),
            source,
        }
    }
}
