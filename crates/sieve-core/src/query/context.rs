//! Per-compilation scratch state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{EntityDef, SchemaRegistry};
use crate::error::Error;

use super::expr::{Join, JoinHandle, Source};

/// Where navigation stands after following a dotted prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathState {
    /// Row the next attribute is read from.
    pub source: Source,
    /// Type whose attributes come next.
    pub type_name: String,
    /// Embedded hops taken since `source`.
    pub hops: Vec<String>,
}

/// Scratch scope of one compilation.
///
/// Holds the root entity, the join plan built so far (dotted prefix to
/// resolved state), and type definitions fetched from the registry. A context
/// is created per call and consumed when the plan is assembled; it is never
/// shared between compilations.
#[derive(Debug)]
pub struct QueryContext {
    root: Arc<EntityDef>,
    identifier: String,
    joins: Vec<Join>,
    paths: HashMap<String, PathState>,
    types: HashMap<String, Arc<EntityDef>>,
}

impl QueryContext {
    /// Start a compilation rooted at `entity`.
    ///
    /// Fails with [`Error::UnknownEntity`] when the registry does not know the
    /// entity or it has no identifier.
    pub fn new(registry: &dyn SchemaRegistry, entity: &str) -> Result<Self, Error> {
        let root = registry.entity(entity)?;
        let identifier = root
            .identity_field
            .clone()
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;

        let mut types = HashMap::new();
        types.insert(root.name.clone(), Arc::clone(&root));

        Ok(Self {
            root,
            identifier,
            joins: Vec::new(),
            paths: HashMap::new(),
            types,
        })
    }

    /// Root entity definition.
    pub fn root(&self) -> &EntityDef {
        &self.root
    }

    /// Root identifier attribute name.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Joins created so far, in creation order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Navigation state at the root.
    pub fn root_state(&self) -> PathState {
        PathState {
            source: Source::Root,
            type_name: self.root.name.clone(),
            hops: Vec::new(),
        }
    }

    /// Type definition, fetched from the registry at most once per context.
    pub fn lookup_type(
        &mut self,
        registry: &dyn SchemaRegistry,
        name: &str,
    ) -> Result<Arc<EntityDef>, Error> {
        if let Some(def) = self.types.get(name) {
            return Ok(Arc::clone(def));
        }
        let def = registry.entity(name)?;
        self.types.insert(name.to_string(), Arc::clone(&def));
        Ok(def)
    }

    /// Cached state of a dotted prefix.
    pub fn cached_path(&self, prefix: &str) -> Option<&PathState> {
        self.paths.get(prefix)
    }

    pub(crate) fn cache_path(&mut self, prefix: impl Into<String>, state: PathState) {
        self.paths.insert(prefix.into(), state);
    }

    pub(crate) fn add_join(
        &mut self,
        parent: Source,
        attribute_path: Vec<String>,
        entity: impl Into<String>,
        prefix: impl Into<String>,
    ) -> JoinHandle {
        let handle = JoinHandle(self.joins.len());
        self.joins.push(Join {
            handle,
            parent,
            attribute_path,
            entity: entity.into(),
            prefix: prefix.into(),
        });
        handle
    }

    /// Consume the context, keeping the join plan.
    pub fn into_joins(self) -> Vec<Join> {
        self.joins
    }
}
