//! Schema bundle - a set of type definitions loaded together.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::EntityDef;
use crate::error::Error;

/// A versioned set of entity and embeddable definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version.
    pub version: u64,
    /// Type definitions keyed by name.
    pub entities: IndexMap<String, EntityDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            entities: IndexMap::new(),
        }
    }

    /// Read a bundle from JSON text.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::InvalidSchema(e.to_string()))
    }

    /// Add an entity or embeddable type to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Get a type by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Check that identifiers exist and every navigable attribute points at a
    /// known type.
    pub fn validate(&self) -> Result<(), Error> {
        for entity in self.entities.values() {
            if let Some(id) = &entity.identity_field {
                if entity.get_field(id).is_none() {
                    return Err(Error::InvalidSchema(format!(
                        "{}: identifier '{}' is not an attribute",
                        entity.name, id
                    )));
                }
            }

            for field in &entity.fields {
                if let Some(target) = field.field_type.target_type() {
                    if !self.entities.contains_key(target) {
                        return Err(Error::InvalidSchema(format!(
                            "{}.{}: unknown type '{}'",
                            entity.name, field.name, target
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
