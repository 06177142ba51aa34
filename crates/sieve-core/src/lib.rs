//! Sieve Core - schema catalog, query compiler and reference execution engine.
//!
//! This crate compiles search criteria into executable query plans against a
//! schema of typed entities, and runs plans against in-memory records.

pub mod catalog;
pub mod config;
pub mod error;
pub mod query;

pub use catalog::{
    Cardinality, Catalog, EntityDef, FieldDef, FieldType, ScalarType, SchemaBundle,
    SchemaRegistry, SchemaSource,
};
pub use config::{CompilerConfig, DateTimeSettings};
pub use error::Error;
pub use query::{
    ExecutionEngine, MemoryEngine, Projection, QueryCompiler, QueryContext, QueryPlan, ResultSet,
    RowShape,
};

/// Re-export protocol types.
pub use sieve_proto as proto;
