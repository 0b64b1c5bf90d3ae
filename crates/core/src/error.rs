//! Error types for the Rollcall core crate.

use thiserror::Error;

/// Top-level error type for all Rollcall core operations.
#[derive(Debug, Error)]
pub enum RollcallError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// The course has no organization installation yet.
    #[error("course not set up: {0}")]
    NotSetUp(String),

    /// The external invitation call failed after the record was updated.
    #[error("invite failed: {0}")]
    InviteFailed(String),

    #[error("organization API error: {0}")]
    Org(String),

    #[error("import error: {0}")]
    Import(String),

    #[error("job error: {0}")]
    Job(String),
}

/// A convenience Result alias that defaults to [`RollcallError`].
pub type Result<T> = std::result::Result<T, RollcallError>;
