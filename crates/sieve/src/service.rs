//! The search service.

use std::sync::Arc;

use serde::Serialize;
use sieve_core::{
    CompilerConfig, ExecutionEngine, QueryCompiler, QueryPlan, ResultSet, SchemaRegistry,
};
use sieve_proto::{Object, SearchCriteria};
use tracing::{debug, info, instrument};

use crate::config::SieveConfig;
use crate::error::Error;
use crate::mapper::{DtoMapper, MapperRegistry};

/// One page of results and the size of the whole result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: ResultSet,
    /// Number of root entities matching the filters, ignoring pagination.
    pub total: u64,
}

/// Compiles search criteria and runs them on an execution engine.
///
/// The service is cheap to share: the registry and engine are reference
/// counted, and mappers can be registered through a shared reference.
pub struct Sieve {
    registry: Arc<dyn SchemaRegistry>,
    engine: Arc<dyn ExecutionEngine>,
    config: SieveConfig,
    mappers: MapperRegistry,
}

impl Sieve {
    pub fn new(
        registry: Arc<dyn SchemaRegistry>,
        engine: Arc<dyn ExecutionEngine>,
        config: SieveConfig,
    ) -> Self {
        Self {
            registry,
            engine,
            config,
            mappers: MapperRegistry::new(),
        }
    }

    /// Register a DTO mapper for an entity.
    pub fn with_mapper(self, entity: impl Into<String>, mapper: impl DtoMapper + 'static) -> Self {
        self.mappers.register(entity, mapper);
        self
    }

    pub fn mappers(&self) -> &MapperRegistry {
        &self.mappers
    }

    pub fn config(&self) -> &SieveConfig {
        &self.config
    }

    fn compiler_config(&self) -> &CompilerConfig {
        &self.config.compiler
    }

    /// Compile criteria into a plan without running it.
    pub fn compile(&self, criteria: &SearchCriteria) -> Result<QueryPlan, Error> {
        let plan =
            QueryCompiler::new(self.registry.as_ref(), self.compiler_config()).compile(criteria)?;
        self.trace_plan(&plan);
        Ok(plan)
    }

    /// Run a search.
    ///
    /// A single-result search keeps only its first record. With DTO
    /// resolution, entity records go through the mapper registered for the
    /// root entity.
    #[instrument(skip_all, fields(entity = %criteria.entity))]
    pub fn search(&self, criteria: &SearchCriteria) -> Result<ResultSet, Error> {
        let plan = self.compile(criteria)?;
        let mut result = self.engine.execute(&plan)?;
        if plan.single_result {
            result.truncate_to_first();
        }
        debug!(rows = result.len(), "Search complete");
        self.resolve_dto(criteria, &plan.root_entity, result)
    }

    /// Run a search and return its first record, if any.
    pub fn search_one(&self, criteria: &SearchCriteria) -> Result<Option<Object>, Error> {
        let single = criteria.clone().single();
        Ok(self.search(&single)?.into_records().into_iter().next())
    }

    /// Run a search and count its whole result.
    pub fn search_page(&self, criteria: &SearchCriteria) -> Result<Page, Error> {
        let items = self.search(criteria)?;
        let total = self.count(criteria)?;
        Ok(Page { items, total })
    }

    /// Count root entities matching the filters.
    #[instrument(skip_all, fields(entity = %criteria.entity))]
    pub fn count(&self, criteria: &SearchCriteria) -> Result<u64, Error> {
        let plan = QueryCompiler::new(self.registry.as_ref(), self.compiler_config())
            .compile_count(criteria)?;
        self.trace_plan(&plan);
        Ok(self.engine.count(&plan)?)
    }

    pub fn exists(&self, criteria: &SearchCriteria) -> Result<bool, Error> {
        Ok(self.count(criteria)? > 0)
    }

    /// Run a search given as a JSON document and encode the result as JSON.
    pub fn search_json(&self, document: &str) -> Result<serde_json::Value, Error> {
        let criteria = SearchCriteria::from_json(document)?;
        let result = self.search(&criteria)?;
        Ok(serde_json::to_value(result)?)
    }

    fn resolve_dto(
        &self,
        criteria: &SearchCriteria,
        entity: &str,
        result: ResultSet,
    ) -> Result<ResultSet, Error> {
        match result {
            ResultSet::Entities(records) if criteria.resolve_dto => {
                Ok(ResultSet::Entities(self.mappers.apply(entity, records)?))
            }
            other => Ok(other),
        }
    }

    fn trace_plan(&self, plan: &QueryPlan) {
        if self.config.debug {
            info!(entity = %plan.root_entity, plan = %plan, "Compiled query");
        } else {
            debug!(entity = %plan.root_entity, plan = %plan, "Compiled query");
        }
    }
}

impl std::fmt::Debug for Sieve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sieve")
            .field("config", &self.config)
            .field("mappers", &self.mappers)
            .finish_non_exhaustive()
    }
}
