//! Schema catalog.
//!
//! The catalog describes the mapped domain: entities with their identifier,
//! embeddable value types, attribute types and relationships. The query
//! compiler only reads it, through the [`SchemaRegistry`] trait.

mod catalog;
mod entity;
mod field;
mod registry;
mod schema;
mod types;

pub use catalog::Catalog;
pub use entity::EntityDef;
pub use field::FieldDef;
pub use registry::{SchemaRegistry, SchemaSource};
pub use schema::SchemaBundle;
pub use types::{Cardinality, FieldType, ScalarType};
