//! Core type definitions for the catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Arbitrary-precision decimal.
    Decimal,
    /// UTF-8 string.
    String,
    /// Single character.
    Char,
    /// Legacy point in time, parsed with every date strategy.
    Timestamp,
    /// Point in time given as epoch milliseconds or RFC 3339.
    Instant,
    /// Date-time with offset, RFC 3339.
    OffsetDateTime,
    /// Calendar date.
    LocalDate,
    /// Date-time without zone.
    LocalDateTime,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int16
                | ScalarType::Int32
                | ScalarType::Int64
                | ScalarType::Float32
                | ScalarType::Float64
                | ScalarType::Decimal
        )
    }

    /// Check if this type compares as text.
    pub fn is_string_like(&self) -> bool {
        matches!(self, ScalarType::String | ScalarType::Char)
    }

    /// Check if this type holds a date or a point in time.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarType::Timestamp
                | ScalarType::Instant
                | ScalarType::OffsetDateTime
                | ScalarType::LocalDate
                | ScalarType::LocalDateTime
        )
    }
}

/// Number of targets on the far side of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Many-to-one or one-to-one.
    ToOne,
    /// One-to-many or many-to-many.
    ToMany,
}

/// Declared type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An enumeration type.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant names.
        variants: Vec<String>,
    },
    /// An embedded value object, stored inline with its owner.
    Embedded {
        /// Name of the embeddable type.
        type_name: String,
    },
    /// A composite primary key, stored inline with its owner.
    CompositeKey {
        /// Name of the key type.
        type_name: String,
    },
    /// A relationship to another entity. Navigating it requires a join.
    Relation {
        /// Target entity name.
        entity: String,
        /// Relationship cardinality.
        cardinality: Cardinality,
    },
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar_type: ScalarType) -> Self {
        FieldType::Scalar(scalar_type)
    }

    /// Create an enum field type.
    pub fn enumeration(name: impl Into<String>, variants: Vec<String>) -> Self {
        FieldType::Enum {
            name: name.into(),
            variants,
        }
    }

    /// Create an embedded value field type.
    pub fn embedded(type_name: impl Into<String>) -> Self {
        FieldType::Embedded {
            type_name: type_name.into(),
        }
    }

    /// Create a composite key field type.
    pub fn composite_key(type_name: impl Into<String>) -> Self {
        FieldType::CompositeKey {
            type_name: type_name.into(),
        }
    }

    /// Create a to-one relationship.
    pub fn to_one(entity: impl Into<String>) -> Self {
        FieldType::Relation {
            entity: entity.into(),
            cardinality: Cardinality::ToOne,
        }
    }

    /// Create a to-many relationship.
    pub fn to_many(entity: impl Into<String>) -> Self {
        FieldType::Relation {
            entity: entity.into(),
            cardinality: Cardinality::ToMany,
        }
    }

    /// The scalar type, if this is a scalar.
    pub fn as_scalar(&self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// Check if values of this type compare as text.
    pub fn is_string_like(&self) -> bool {
        self.as_scalar().is_some_and(|s| s.is_string_like())
    }

    /// Check if this type holds a date or a point in time.
    pub fn is_temporal(&self) -> bool {
        self.as_scalar().is_some_and(|s| s.is_temporal())
    }

    /// Check if navigating through this attribute stays on the same row.
    pub fn is_inline(&self) -> bool {
        matches!(self, FieldType::Embedded { .. } | FieldType::CompositeKey { .. })
    }

    /// Check if this attribute is a to-many relationship.
    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            FieldType::Relation {
                cardinality: Cardinality::ToMany,
                ..
            }
        )
    }

    /// The type reached by navigating through this attribute, if any.
    pub fn target_type(&self) -> Option<&str> {
        match self {
            FieldType::Embedded { type_name } | FieldType::CompositeKey { type_name } => {
                Some(type_name)
            }
            FieldType::Relation { entity, .. } => Some(entity),
            FieldType::Scalar(_) | FieldType::Enum { .. } => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => write!(f, "{s:?}"),
            FieldType::Enum { name, .. } => write!(f, "Enum({name})"),
            FieldType::Embedded { type_name } => write!(f, "Embedded({type_name})"),
            FieldType::CompositeKey { type_name } => write!(f, "CompositeKey({type_name})"),
            FieldType::Relation {
                entity,
                cardinality: Cardinality::ToOne,
            } => write!(f, "ToOne({entity})"),
            FieldType::Relation {
                entity,
                cardinality: Cardinality::ToMany,
            } => write!(f, "ToMany({entity})"),
        }
    }
}
