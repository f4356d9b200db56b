use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("catalog error during scan: {0}")]
    Catalog(#[from] nodupe_catalog::CatalogError),

    #[error("walker failed on {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
