//! Projection building: what each result row holds.

use indexmap::IndexMap;
use sieve_proto::{FunctionSpec, SearchCriteria, Value};
use tracing::{debug, warn};

use crate::catalog::SchemaRegistry;

use super::context::QueryContext;
use super::expr::{Expr, Selection};
use super::join::JoinResolver;

/// Shape of the plan's output rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Full root entity records.
    Entity,
    /// Named values, one per selection.
    Columns(Vec<Selection>),
    /// Number of matching root entities.
    Count { distinct: bool },
}

impl Projection {
    /// Check if rows are named-value tuples.
    pub fn is_tuple(&self) -> bool {
        matches!(self, Projection::Columns(_))
    }

    /// Tuple selections; empty for other shapes.
    pub fn selections(&self) -> &[Selection] {
        match self {
            Projection::Columns(selections) => selections,
            _ => &[],
        }
    }

    /// Check if any selection is or contains an aggregate call.
    pub fn contains_aggregate(&self) -> bool {
        self.selections()
            .iter()
            .any(|s| s.expr.contains_aggregate())
    }
}

/// Builds the projection from `functions`, `columns`, or neither.
pub struct ProjectionBuilder<'a> {
    resolver: JoinResolver<'a>,
}

impl<'a> ProjectionBuilder<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry) -> Self {
        Self {
            resolver: JoinResolver::new(registry),
        }
    }

    /// Decide the projection. Functions win over columns.
    pub fn build(&self, ctx: &mut QueryContext, criteria: &SearchCriteria) -> Projection {
        if !criteria.functions.is_empty() {
            return Projection::Columns(self.functions(ctx, &criteria.functions));
        }

        if !criteria.columns.is_empty() {
            let selections = self.columns(ctx, &criteria.columns);
            if !selections.is_empty() {
                return Projection::Columns(selections);
            }
            warn!(entity = %criteria.entity, "No projected column resolved, selecting the entity");
        }

        Projection::Entity
    }

    fn functions(
        &self,
        ctx: &mut QueryContext,
        functions: &IndexMap<String, FunctionSpec>,
    ) -> Vec<Selection> {
        let mut selections = Vec::with_capacity(functions.len());
        for (alias, spec) in functions {
            if spec.as_single() == Some(alias.as_str()) {
                if let Ok(resolved) = self.resolver.resolve(ctx, alias) {
                    selections.push(Selection::aliased(resolved.expr(), alias.clone()));
                    continue;
                }
            }

            let args = spec
                .references()
                .into_iter()
                .map(|reference| match self.resolver.resolve(ctx, reference) {
                    Ok(resolved) => resolved.expr(),
                    Err(e) => {
                        debug!(function = %alias, argument = %reference, error = %e, "Using argument as a literal");
                        Expr::Literal(Value::String(reference.to_string()))
                    }
                })
                .collect();
            selections.push(Selection::aliased(Expr::function(alias.clone(), args), alias.clone()));
        }
        selections
    }

    fn columns(&self, ctx: &mut QueryContext, columns: &[String]) -> Vec<Selection> {
        let mut selections = Vec::with_capacity(columns.len());
        for column in columns {
            match self.resolver.resolve(ctx, column) {
                Ok(resolved) => selections.push(Selection::aliased(resolved.expr(), column.clone())),
                Err(e) => warn!(column = %column, error = %e, "Skipping column"),
            }
        }
        selections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::invoice_catalog;

    fn rendered(projection: &Projection) -> Vec<String> {
        projection
            .selections()
            .iter()
            .map(|s| format!("{} AS {}", s.expr, s.key(0)))
            .collect()
    }

    #[test]
    fn test_entity_by_default() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let projection = ProjectionBuilder::new(&catalog).build(&mut ctx, &SearchCriteria::new("Invoice"));
        assert_eq!(projection, Projection::Entity);
        assert!(!projection.is_tuple());
    }

    #[test]
    fn test_columns_aliased_by_path() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let criteria = SearchCriteria::new("Invoice")
            .with_column("number")
            .with_column("customer.name")
            .with_column("nope");

        let projection = ProjectionBuilder::new(&catalog).build(&mut ctx, &criteria);

        assert_eq!(
            rendered(&projection),
            vec!["number AS number", "customer.name AS customer.name"]
        );
        assert_eq!(ctx.joins().len(), 1);
    }

    #[test]
    fn test_all_columns_unresolved_selects_entity() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let criteria = SearchCriteria::new("Invoice").with_column("nope");
        assert_eq!(
            ProjectionBuilder::new(&catalog).build(&mut ctx, &criteria),
            Projection::Entity
        );
    }

    #[test]
    fn test_functions() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let criteria = SearchCriteria::new("Invoice")
            .with_column("ignored")
            .with_function("status", "status")
            .with_function("sum", "amount")
            .with_function("concat", vec!["number", "-", "customer.name"]);

        let projection = ProjectionBuilder::new(&catalog).build(&mut ctx, &criteria);

        assert_eq!(
            rendered(&projection),
            vec![
                "status AS status",
                "SUM(amount) AS sum",
                "CONCAT(number, '-', customer.name) AS concat",
            ]
        );
        assert!(projection.contains_aggregate());
    }

    #[test]
    fn test_single_function_is_a_tuple() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let criteria = SearchCriteria::new("Invoice").with_function("number", "number");

        let projection = ProjectionBuilder::new(&catalog).build(&mut ctx, &criteria);
        assert!(projection.is_tuple());
        assert_eq!(rendered(&projection), vec!["number AS number"]);
    }
}
