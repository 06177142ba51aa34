//! Protocol error types.

use thiserror::Error;

use crate::condition::Comparator;

/// Errors raised while reading or validating a search document.
#[derive(Debug, Error)]
pub enum Error {
    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A condition carries the wrong number of values for its comparator.
    #[error("{comparator} expects {expected} value(s), got {actual}")]
    InvalidConditionArity {
        comparator: Comparator,
        expected: &'static str,
        actual: usize,
    },

    /// A condition document is structurally invalid.
    #[error("invalid condition: {0}")]
    InvalidCondition(String),

    /// Seek pagination was requested without the fields it needs.
    #[error("seek pagination requires {0}")]
    IncompleteSeekSpecification(&'static str),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Deserialization(e.to_string())
    }
}
