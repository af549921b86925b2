use std::io;
use thiserror::Error;

/// Crate-wide error type.
///
/// Mutating operations always roll their transaction back before surfacing an
/// error, so a `Sqlite` failure is safe to retry from scratch. Version and
/// corruption failures at open time are terminal.
#[derive(Error, Debug)]
pub enum CelltraceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("corrupt store: {0}")]
    CorruptFile(String),
    #[error("store schema version {found} is newer than the latest supported version {supported}")]
    UnsupportedNewerVersion { found: i64, supported: i64 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl CelltraceError {
    /// Whether re-running the failed operation can succeed. Transaction-level
    /// failures rolled back fully and left nothing partial behind; schema and
    /// corruption failures will fail the same way every time.
    pub fn retry_is_safe(&self) -> bool {
        matches!(self, CelltraceError::Sqlite(_) | CelltraceError::Io(_))
    }
}
