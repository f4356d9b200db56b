use thiserror::Error;

/// Typed error surfaced by every Catalog operation.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog connection error: {0}")]
    Connection(String),

    #[error("catalog integrity error: {0}")]
    Integrity(String),

    #[error("catalog schema error: {0}")]
    Schema(String),

    #[error("catalog io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no file with path {0:?}")]
    NotFound(String),

    #[error("file already present at path {0:?}")]
    DuplicatePath(String),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CatalogError::Integrity(err.to_string())
            }
            _ => CatalogError::Connection(err.to_string()),
        }
    }
}
