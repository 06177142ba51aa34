//! Sieve - compile declarative search documents into executable query plans.
//!
//! This crate is the entry point: it wires a schema registry and an execution
//! engine into a [`Sieve`] search service.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use sieve::{Catalog, MemoryEngine, Sieve, SieveConfig};
//! use sieve::proto::{Condition, Direction, SearchCriteria};
//!
//! let catalog = Arc::new(Catalog::from_bundle(schema)?);
//! let engine = Arc::new(MemoryEngine::new().with_records("Invoice", records));
//! let sieve = Sieve::new(catalog, engine, SieveConfig::default());
//!
//! let criteria = SearchCriteria::new("Invoice")
//!     .with_filter("amount", Condition::between(100, 200))
//!     .with_order("issuedAt", Direction::Desc)
//!     .with_page_size(10);
//! let page = sieve.search_page(&criteria)?;
//! println!("{} of {}", page.items.len(), page.total);
//! ```

pub mod config;
pub mod error;
pub mod mapper;
pub mod service;

pub use config::SieveConfig;
pub use error::Error;
pub use mapper::{DtoMapper, MapperRegistry};
pub use service::{Page, Sieve};

pub use sieve_core::{
    Catalog, CompilerConfig, DateTimeSettings, ExecutionEngine, MemoryEngine, QueryPlan,
    ResultSet, SchemaBundle, SchemaRegistry,
};

/// Re-export protocol types.
pub use sieve_proto as proto;
