//! Error taxonomy for the engine.
//!
//! Recoverable per-file failures (parse, read) stay inside a batch outcome
//! and never surface through these variants; everything here crosses the
//! facade boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Operation on an engine that has been closed.
    #[error("engine is closed")]
    Closed,

    /// The parser rejected a file outside of a batch context.
    #[error("failed to parse '{file}'")]
    Parse { file: String },

    /// Write-lock contention that survived every retry.
    #[error("store busy after {attempts} attempts")]
    StoreBusy { attempts: u32 },

    /// Referential integrity violation detected after a migration window.
    #[error("store integrity violation: {0}")]
    StoreIntegrity(String),

    /// Filesystem watcher malfunction.
    #[error("watcher failure: {0}")]
    Watcher(String),

    /// Ownership could not be acquired or refreshed.
    #[error("ownership failure: {0}")]
    Ownership(String),

    /// File read failure surfaced outside of a batch.
    #[error("i/o failure on '{file}'")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        Error::Watcher(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
