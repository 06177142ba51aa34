//! Sieve document types.
//!
//! This crate defines the search criteria document accepted by the sieve
//! query compiler, and the runtime values that compiled plans and results are
//! expressed in.
//!
//! # Modules
//!
//! - [`criteria`] - The search criteria document and its builder
//! - [`condition`] - Filter conditions, comparators and operands
//! - [`value`] - Runtime value types for predicates and results
//! - [`error`] - Document error types
//!
//! # Reading documents
//!
//! Documents are JSON. Loosely typed condition values are classified once,
//! while reading:
//!
//! ```ignore
//! use sieve_proto::SearchCriteria;
//!
//! let criteria = SearchCriteria::from_json(r#"{
//!     "entity": "Invoice",
//!     "filters": {"amount": {"comparador": "BETWEEN", "values": [100, 200]}},
//!     "orders": {"issuedAt": "DESC"},
//!     "pageSize": 10
//! }"#)?;
//! ```

pub mod condition;
pub mod criteria;
pub mod error;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use condition::{Comparator, Condition, Operand};
pub use criteria::{Direction, FunctionSpec, SearchCriteria, SeekSpec};
pub use value::{Object, Value};
