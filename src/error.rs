// Error taxonomy shared across the daemon.
//
// Recoverable kinds never unwind past a worker loop: they are logged and
// surfaced to plugins as a failed callback. Only panics are treated as fatal,
// and even those take down at most the originating worker.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown action, service id, sub-service id or indexer operation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Startup arguments were invalid; the service stays degraded.
    #[error("service precondition missing: {0}")]
    PreconditionMissing(String),

    /// The parser produced no translation unit.
    #[error("failed to parse '{0}'")]
    ParseFailure(PathBuf),

    /// A lookup legitimately came up empty (no definition, no include, ...).
    #[error("lookup miss: {0}")]
    LookupMiss(String),

    /// Query or write attempted on a symbol database that is not open.
    #[error("symbol database is not open")]
    StoreClosed,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
