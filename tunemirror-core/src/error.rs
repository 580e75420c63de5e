use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "database-errors")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The cache file was written by a different schema level and must be rebuilt.
    #[error("Schema mismatch: expected level {expected}, found {found:?}")]
    SchemaMismatch { expected: i64, found: Option<i64> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote catalog error: {0}")]
    Remote(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl MirrorError {
    /// True when the cache file must be discarded and recreated.
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, MirrorError::SchemaMismatch { .. })
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
