use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("catalog error while planning: {0}")]
    Catalog(#[from] nodupe_catalog::CatalogError),

    #[error("failed to write plan file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize plan: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("strategy '{0}' requires a target directory but none was given")]
    MissingTarget(String),
}
