//! Domain-level error taxonomy.

use crate::query::error::QueryError;

/// Errors produced by snapshot construction, lookups and the async service.
#[derive(Debug, thiserror::Error)]
pub enum HParamsError {
    #[error("duplicate session name in snapshot: {0}")]
    DuplicateSession(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("snapshot source error: {0}")]
    Source(String),

    #[error("query task failed: {0}")]
    TaskFailed(String),

    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, HParamsError>;
