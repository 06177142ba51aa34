//! Schema registry abstraction consumed by the query compiler.

use std::sync::Arc;

use super::{EntityDef, FieldType};
use crate::error::Error;

/// Read-only view of the mapped domain.
///
/// The compiler asks the registry for a type's attributes and an entity's
/// identifier. Implementations must be safe to share between threads.
pub trait SchemaRegistry: Send + Sync {
    /// Look up an entity or embeddable type by name.
    fn entity(&self, name: &str) -> Result<Arc<EntityDef>, Error>;

    /// Declared type of an attribute of a type.
    fn attribute(&self, type_name: &str, attribute: &str) -> Result<FieldType, Error> {
        let entity = self.entity(type_name)?;
        entity
            .get_field(attribute)
            .map(|f| f.field_type.clone())
            .ok_or_else(|| Error::UnknownAttribute {
                entity: type_name.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Name of an entity's identifier attribute.
    fn identifier_name(&self, entity: &str) -> Result<String, Error> {
        let def = self.entity(entity)?;
        def.identity_field
            .clone()
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))
    }
}

/// Backend that can produce type definitions on demand.
///
/// A [`Catalog`](super::Catalog) built with a source asks it for any type not
/// yet cached and keeps the answer for the lifetime of the catalog.
pub trait SchemaSource: Send + Sync {
    /// Load a type definition, or `None` if the backend does not know it.
    fn load(&self, name: &str) -> Result<Option<EntityDef>, Error>;
}
