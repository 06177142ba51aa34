//! Concurrent, lazily populated schema catalog.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use super::registry::{SchemaRegistry, SchemaSource};
use super::{EntityDef, SchemaBundle};
use crate::error::Error;

/// In-memory [`SchemaRegistry`].
///
/// Definitions are registered up front or loaded from a [`SchemaSource`] on
/// first access. Cached definitions are immutable and shared as `Arc`s; when
/// two threads load the same type concurrently, the first insert wins.
pub struct Catalog {
    entities: DashMap<String, Arc<EntityDef>>,
    source: Option<Box<dyn SchemaSource>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            entities: DashMap::new(),
            source: None,
        }
    }

    /// Create a catalog that loads unknown types from a source.
    pub fn with_source(source: impl SchemaSource + 'static) -> Self {
        Self {
            entities: DashMap::new(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a catalog holding every type of a validated bundle.
    pub fn from_bundle(bundle: SchemaBundle) -> Result<Self, Error> {
        let catalog = Self::new();
        catalog.apply_schema(bundle)?;
        Ok(catalog)
    }

    /// Validate a bundle and register its types, replacing existing ones.
    pub fn apply_schema(&self, bundle: SchemaBundle) -> Result<u64, Error> {
        bundle.validate()?;
        let version = bundle.version;
        for (name, entity) in bundle.entities {
            self.entities.insert(name, Arc::new(entity));
        }
        Ok(version)
    }

    /// Register a single type, replacing any previous definition.
    pub fn register(&self, entity: EntityDef) {
        self.entities.insert(entity.name.clone(), Arc::new(entity));
    }

    /// Names of all cached types.
    pub fn list_entities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Check if a type is cached.
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry for Catalog {
    fn entity(&self, name: &str) -> Result<Arc<EntityDef>, Error> {
        if let Some(entity) = self.entities.get(name) {
            return Ok(Arc::clone(entity.value()));
        }

        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))?;
        let loaded = source
            .load(name)?
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))?;

        debug!(entity = %name, "Loaded type definition from schema source");
        let entry = self
            .entities
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(loaded));
        Ok(Arc::clone(entry.value()))
    }
}
