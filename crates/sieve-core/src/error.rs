//! Core error types.

use sieve_proto::Comparator;
use thiserror::Error;

/// Compiler and execution errors.
///
/// Only an unknown root entity aborts a compilation. The other compile-time
/// variants are raised per field, logged, and the offending filter, order
/// term, column or group-by entry is left out of the plan.
#[derive(Debug, Error)]
pub enum Error {
    /// Document error.
    #[error("protocol error: {0}")]
    Protocol(#[from] sieve_proto::Error),

    /// The registry does not know the type.
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// The type has no such attribute.
    #[error("unknown attribute '{attribute}' on {entity}")]
    UnknownAttribute { entity: String, attribute: String },

    /// A dotted path cannot be navigated.
    #[error("cannot resolve '{path}': {reason}")]
    JoinResolutionFailure { path: String, reason: String },

    /// A raw value does not parse as the target type.
    #[error("cannot coerce '{value}' to {target}")]
    UnsupportedCoercion { value: String, target: String },

    /// The comparator does not apply to the attribute's type.
    #[error("{comparator} is not supported on {field} ({field_type})")]
    UnsupportedComparator {
        comparator: Comparator,
        field: String,
        field_type: String,
    },

    /// The execution engine does not implement a projected function.
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),

    /// Invalid schema definition.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Plan execution failed.
    #[error("execution error: {0}")]
    Execution(String),
}
