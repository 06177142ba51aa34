//! DTO mappers, registered per entity name.
//!
//! When a search asks for DTO resolution, each entity record is passed through
//! the mapper registered for the root entity. Entities without a mapper are
//! returned unchanged.

use std::sync::Arc;

use dashmap::DashMap;
use sieve_proto::Object;
use tracing::debug;

use crate::error::Error;

/// Maps an entity record to its transfer representation.
pub trait DtoMapper: Send + Sync {
    fn map(&self, record: Object) -> Result<Object, String>;
}

impl<F> DtoMapper for F
where
    F: Fn(Object) -> Object + Send + Sync,
{
    fn map(&self, record: Object) -> Result<Object, String> {
        Ok(self(record))
    }
}

/// Thread-safe registry of DTO mappers keyed by entity name.
#[derive(Default)]
pub struct MapperRegistry {
    mappers: DashMap<String, Arc<dyn DtoMapper>>,
}

impl MapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapper, replacing any previous one for the entity.
    pub fn register(&self, entity: impl Into<String>, mapper: impl DtoMapper + 'static) {
        self.mappers.insert(entity.into(), Arc::new(mapper));
    }

    pub fn get(&self, entity: &str) -> Option<Arc<dyn DtoMapper>> {
        self.mappers.get(entity).map(|m| Arc::clone(m.value()))
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.mappers.contains_key(entity)
    }

    /// Map records of `entity`; without a registered mapper they pass through.
    pub fn apply(&self, entity: &str, records: Vec<Object>) -> Result<Vec<Object>, Error> {
        let Some(mapper) = self.get(entity) else {
            debug!(entity = %entity, "No DTO mapper registered");
            return Ok(records);
        };

        records
            .into_iter()
            .map(|record| {
                mapper.map(record).map_err(|reason| Error::Mapping {
                    entity: entity.to_string(),
                    reason,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut entities: Vec<String> = self.mappers.iter().map(|e| e.key().clone()).collect();
        entities.sort();
        f.debug_struct("MapperRegistry")
            .field("entities", &entities)
            .finish()
    }
}
