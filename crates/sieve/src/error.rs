//! Search service error types.

use thiserror::Error;

/// Search service errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Compilation or execution failed.
    #[error("core error: {0}")]
    Core(#[from] sieve_core::Error),

    /// Malformed search document.
    #[error("protocol error: {0}")]
    Protocol(#[from] sieve_proto::Error),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A DTO mapper rejected a record.
    #[error("mapping error for {entity}: {reason}")]
    Mapping { entity: String, reason: String },
}
