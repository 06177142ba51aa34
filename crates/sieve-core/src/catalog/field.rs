//! Attribute definitions.

use serde::{Deserialize, Serialize};

use super::types::{FieldType, ScalarType};

/// An attribute of an entity or embeddable type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Attribute name.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
}

impl FieldDef {
    /// Create an attribute.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Create a scalar attribute.
    pub fn scalar(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self::new(name, FieldType::Scalar(scalar_type))
    }
}
