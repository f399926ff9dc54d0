use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sync store {} is closed", .0.display())]
    Closed(PathBuf),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed revision marker {0:?}")]
    MalformedRevision(String),
    #[error("unknown change op: {0}")]
    UnknownOperation(String),
    #[error("unknown sync node kind: {0}")]
    UnknownNodeKind(String),
}

impl StoreError {
    /// True when the error only means the store has been shut down.
    pub fn is_closed(&self) -> bool {
        matches!(self, StoreError::Closed(_))
    }
}
