//! Query compilation: search criteria in, execution plan out.
//!
//! The compiler resolves the root entity through the schema registry and runs
//! the builders in a fixed order: projection, filters, seek predicate,
//! ordering, stable ordering, grouping. An active seek replaces the requested
//! order with the keyset order. Only an unknown root entity fails the
//! compilation; every other failure drops the offending entry with a warning.

use std::fmt;

use sieve_proto::{SearchCriteria, SeekSpec};
use tracing::{debug, instrument, warn};

use crate::catalog::SchemaRegistry;
use crate::config::CompilerConfig;
use crate::error::Error;

use super::context::QueryContext;
use super::expr::{Expr, Join, OrderTerm, Predicate};
use super::group::GroupByBuilder;
use super::ordering::OrderingBuilder;
use super::predicate::PredicateCompiler;
use super::projection::{Projection, ProjectionBuilder};
use super::seek::SeekPaginationBuilder;

/// How executed rows are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// One record per root entity.
    Entity,
    /// Alias to value maps.
    Tuple,
    /// A single number.
    Count,
}

/// An executable query plan.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// Root entity type.
    pub root_entity: String,
    /// Identifier attribute of the root entity.
    pub identifier: String,
    /// Inner joins, parents before children.
    pub joins: Vec<Join>,
    pub projection: Projection,
    /// One predicate per compiled filter entry, AND-ed.
    pub filters: Vec<Predicate>,
    /// Keyset predicate, AND-ed with the filters.
    pub seek: Option<Predicate>,
    pub group_by: Vec<Expr>,
    pub order_by: Vec<OrderTerm>,
    pub distinct: bool,
    /// Rows to skip.
    pub offset: Option<u32>,
    /// Maximum rows to return.
    pub limit: Option<u32>,
    /// The caller wants the first row only.
    pub single_result: bool,
}

impl QueryPlan {
    /// The full WHERE clause, if any.
    pub fn restriction(&self) -> Option<Predicate> {
        let mut parts = self.filters.clone();
        parts.extend(self.seek.clone());
        match parts.len() {
            0 => None,
            _ => Some(Predicate::and(parts)),
        }
    }

    pub fn shape(&self) -> RowShape {
        match self.projection {
            Projection::Entity => RowShape::Entity,
            Projection::Columns(_) => RowShape::Tuple,
            Projection::Count { .. } => RowShape::Count,
        }
    }

    /// Check if rows are grouped, explicitly or by an aggregate selection.
    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty() || self.projection.contains_aggregate()
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        match &self.projection {
            Projection::Entity => {
                if self.distinct {
                    f.write_str("DISTINCT ")?;
                }
                f.write_str(&self.root_entity)?;
            }
            Projection::Columns(selections) => {
                if self.distinct {
                    f.write_str("DISTINCT ")?;
                }
                for (i, selection) in selections.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} AS {}", selection.expr, selection.key(i))?;
                }
            }
            Projection::Count { distinct } => {
                let keyword = if *distinct { "DISTINCT " } else { "" };
                write!(f, "COUNT({keyword}{})", self.root_entity)?;
            }
        }

        write!(f, " FROM {}", self.root_entity)?;
        for join in &self.joins {
            write!(f, " INNER JOIN {} ON {}", join.entity, join.prefix)?;
        }

        if let Some(restriction) = self.restriction() {
            write!(f, " WHERE {restriction}")?;
        }

        if !self.group_by.is_empty() {
            let rendered: Vec<String> = self.group_by.iter().map(ToString::to_string).collect();
            write!(f, " GROUP BY {}", rendered.join(", "))?;
        }

        if !self.order_by.is_empty() {
            let rendered: Vec<String> = self.order_by.iter().map(ToString::to_string).collect();
            write!(f, " ORDER BY {}", rendered.join(", "))?;
        }

        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

/// Compiles search criteria against a schema registry.
pub struct QueryCompiler<'a> {
    registry: &'a dyn SchemaRegistry,
    config: &'a CompilerConfig,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry, config: &'a CompilerConfig) -> Self {
        Self { registry, config }
    }

    /// Compile a search.
    #[instrument(skip_all, fields(entity = %criteria.entity))]
    pub fn compile(&self, criteria: &SearchCriteria) -> Result<QueryPlan, Error> {
        let mut ctx = QueryContext::new(self.registry, &criteria.entity)?;

        let projection = ProjectionBuilder::new(self.registry).build(&mut ctx, criteria);
        let filters = PredicateCompiler::new(self.registry, self.config)
            .compile_filters(&mut ctx, &criteria.filters);

        let seek = match criteria.seek_spec() {
            Ok(seek) => seek,
            Err(e) => {
                warn!(error = %e, "Ignoring seek pagination");
                None
            }
        };

        let ordering = OrderingBuilder::new(self.registry);
        let keyset = match &seek {
            Some(seek) => match self.keyset(&mut ctx, &ordering, seek) {
                Ok(keyset) => Some(keyset),
                Err(e) => {
                    warn!(cursor = %seek.field, error = %e, "Ignoring seek pagination");
                    None
                }
            },
            None => None,
        };
        let (seek_predicate, mut order_by) = match keyset {
            Some((predicate, terms)) => {
                if !criteria.orders.is_empty() {
                    debug!(orders = criteria.orders.len(), "Seek replaces requested order");
                }
                (Some(predicate), terms)
            }
            None => (None, ordering.build(&mut ctx, &criteria.orders)),
        };

        let grouped = criteria.group_by.iter().any(|g| !g.trim().is_empty())
            || projection.contains_aggregate();
        if !grouped {
            if let Err(e) = ordering.ensure_stable_order(&mut ctx, &mut order_by) {
                warn!(error = %e, "Cannot guarantee a stable order");
            }
        }

        let group_by = GroupByBuilder::new(self.registry).build(&mut ctx, &criteria.group_by);

        // The cursor replaces the offset.
        let offset = if seek_predicate.is_some() {
            None
        } else {
            criteria.first
        };

        let root_entity = ctx.root().name.clone();
        let identifier = ctx.identifier().to_string();
        let joins = ctx.into_joins();

        debug!(
            joins = joins.len(),
            filters = filters.len(),
            seek = seek_predicate.is_some(),
            "Compiled query plan"
        );

        Ok(QueryPlan {
            root_entity,
            identifier,
            joins,
            projection,
            filters,
            seek: seek_predicate,
            group_by,
            order_by,
            distinct: criteria.distinct,
            offset,
            limit: criteria.page_size,
            single_result: criteria.single_result,
        })
    }

    /// Seek predicate and the matching keyset order.
    fn keyset(
        &self,
        ctx: &mut QueryContext,
        ordering: &OrderingBuilder<'_>,
        seek: &SeekSpec,
    ) -> Result<(Predicate, Vec<OrderTerm>), Error> {
        let predicate = SeekPaginationBuilder::new(self.registry, self.config).build(ctx, seek)?;
        let terms = ordering.seek_order(ctx, seek)?;
        Ok((predicate, terms))
    }

    /// Compile the count of a search: its filters only.
    #[instrument(skip_all, fields(entity = %criteria.entity))]
    pub fn compile_count(&self, criteria: &SearchCriteria) -> Result<QueryPlan, Error> {
        let mut ctx = QueryContext::new(self.registry, &criteria.entity)?;
        let filters = PredicateCompiler::new(self.registry, self.config)
            .compile_filters(&mut ctx, &criteria.filters);

        let root_entity = ctx.root().name.clone();
        let identifier = ctx.identifier().to_string();

        Ok(QueryPlan {
            root_entity,
            identifier,
            joins: ctx.into_joins(),
            projection: Projection::Count {
                distinct: criteria.distinct,
            },
            filters,
            seek: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            distinct: criteria.distinct,
            offset: None,
            limit: None,
            single_result: false,
        })
    }
}
