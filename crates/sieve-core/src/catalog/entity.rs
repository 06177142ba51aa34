//! Entity and embeddable type definitions.

use serde::{Deserialize, Serialize};

use super::field::FieldDef;

/// A mapped type: an entity with an identifier, or an embeddable value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    /// Type name (unique within the catalog).
    pub name: String,
    /// Name of the identifier attribute. `None` for embeddable types.
    pub identity_field: Option<String>,
    /// Attribute definitions.
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>, identity_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_field: Some(identity_field.into()),
            fields: Vec::new(),
        }
    }

    /// Create an embeddable value type (also used for composite keys).
    pub fn embeddable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity_field: None,
            fields: Vec::new(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check if this is an embeddable type rather than an entity.
    pub fn is_embeddable(&self) -> bool {
        self.identity_field.is_none()
    }
}
