//! ORDER BY construction and the stable-order guarantee.

use indexmap::IndexMap;
use sieve_proto::{Direction, SeekSpec};
use tracing::warn;

use crate::catalog::SchemaRegistry;
use crate::error::Error;

use super::context::QueryContext;
use super::expr::{Expr, OrderTerm, Source};
use super::join::JoinResolver;

/// Split an order key `path[:functions]` on its first colon.
pub fn split_order_key(key: &str) -> (&str, Option<&str>) {
    match key.split_once(':') {
        Some((path, functions)) => (path.trim(), Some(functions)),
        None => (key.trim(), None),
    }
}

/// Builds ORDER BY terms from the criteria's orders.
pub struct OrderingBuilder<'a> {
    resolver: JoinResolver<'a>,
}

impl<'a> OrderingBuilder<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry) -> Self {
        Self {
            resolver: JoinResolver::new(registry),
        }
    }

    /// One term per order entry, in document order. Failing entries are logged
    /// and skipped.
    pub fn build(
        &self,
        ctx: &mut QueryContext,
        orders: &IndexMap<String, Direction>,
    ) -> Vec<OrderTerm> {
        let mut terms = Vec::with_capacity(orders.len() + 1);
        for (key, direction) in orders {
            match self.term(ctx, key, *direction) {
                Ok(term) => terms.push(term),
                Err(e) => warn!(order = %key, error = %e, "Skipping order term"),
            }
        }
        terms
    }

    /// A single term. `length` and `trim` in the key's function part wrap the
    /// column; with both, length applies to the trimmed value.
    pub fn term(
        &self,
        ctx: &mut QueryContext,
        key: &str,
        direction: Direction,
    ) -> Result<OrderTerm, Error> {
        let (path, functions) = split_order_key(key);
        let mut expr = self.resolver.resolve(ctx, path)?.expr();

        if let Some(functions) = functions {
            let functions = functions.to_lowercase();
            if functions.contains("trim") {
                expr = Expr::trim(expr);
            }
            if functions.contains("length") {
                expr = Expr::length(expr);
            }
        }

        Ok(OrderTerm { expr, direction })
    }

    /// Keyset order for seek pagination: the cursor field, then the root
    /// identifier, both in the cursor direction.
    ///
    /// The seek predicate compares exactly these two keys, so any other order
    /// term would let rows tied on the cursor be skipped or repeated.
    pub fn seek_order(
        &self,
        ctx: &mut QueryContext,
        seek: &SeekSpec,
    ) -> Result<Vec<OrderTerm>, Error> {
        let cursor = self.resolver.resolve(ctx, &seek.field)?.expr();
        let identifier = ctx.identifier().to_string();
        let id = self.resolver.resolve(ctx, &identifier)?.expr();

        let mut terms = vec![OrderTerm {
            expr: cursor,
            direction: seek.direction,
        }];
        if terms[0].expr != id {
            terms.push(OrderTerm {
                expr: id,
                direction: seek.direction,
            });
        }
        Ok(terms)
    }

    /// Append the root identifier unless some term already orders by it, so
    /// that pages never overlap or skip rows.
    ///
    /// The identifier takes the first term's direction, or ascending.
    pub fn ensure_stable_order(
        &self,
        ctx: &mut QueryContext,
        terms: &mut Vec<OrderTerm>,
    ) -> Result<(), Error> {
        let identifier = ctx.identifier().to_string();
        let orders_identifier = terms.iter().any(|t| match &t.expr {
            Expr::Field(field) => field.source == Source::Root && field.path == [identifier.as_str()],
            _ => false,
        });
        if orders_identifier {
            return Ok(());
        }

        let direction = terms.first().map(|t| t.direction).unwrap_or_default();
        let id = self.resolver.resolve(ctx, &identifier)?;
        terms.push(OrderTerm {
            expr: id.expr(),
            direction,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::invoice_catalog;

    fn orders(entries: &[(&str, Direction)]) -> IndexMap<String, Direction> {
        entries.iter().map(|(k, d)| (k.to_string(), *d)).collect()
    }

    fn render(terms: &[OrderTerm]) -> Vec<String> {
        terms.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_split_order_key() {
        assert_eq!(split_order_key("name"), ("name", None));
        assert_eq!(split_order_key("name:length"), ("name", Some("length")));
        assert_eq!(split_order_key("a.b:trim:x"), ("a.b", Some("trim:x")));
    }

    #[test]
    fn test_function_wrappers() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let builder = OrderingBuilder::new(&catalog);

        let terms = builder.build(
            &mut ctx,
            &orders(&[
                ("number:length", Direction::Asc),
                ("customer.name:TRIM", Direction::Desc),
                ("key.series:length,trim", Direction::Asc),
                ("missing", Direction::Asc),
            ]),
        );

        assert_eq!(
            render(&terms),
            vec![
                "LENGTH(number) ASC",
                "TRIM(customer.name) DESC",
                "LENGTH(TRIM(key.series)) ASC",
            ]
        );
    }

    #[test]
    fn test_stable_order_appends_identifier() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let builder = OrderingBuilder::new(&catalog);

        let mut terms = builder.build(&mut ctx, &orders(&[("issuedAt", Direction::Desc)]));
        builder.ensure_stable_order(&mut ctx, &mut terms).unwrap();
        assert_eq!(render(&terms), vec!["issuedAt DESC", "id DESC"]);

        let mut empty = Vec::new();
        builder.ensure_stable_order(&mut ctx, &mut empty).unwrap();
        assert_eq!(render(&empty), vec!["id ASC"]);
    }

    #[test]
    fn test_stable_order_keeps_explicit_identifier() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let builder = OrderingBuilder::new(&catalog);

        let mut terms = builder.build(
            &mut ctx,
            &orders(&[("id", Direction::Desc), ("number", Direction::Asc)]),
        );
        builder.ensure_stable_order(&mut ctx, &mut terms).unwrap();
        assert_eq!(render(&terms), vec!["id DESC", "number ASC"]);

        // A joined entity's id does not count.
        let mut joined = builder.build(&mut ctx, &orders(&[("customer.id", Direction::Asc)]));
        builder.ensure_stable_order(&mut ctx, &mut joined).unwrap();
        assert_eq!(render(&joined), vec!["customer.id ASC", "id ASC"]);
    }

    #[test]
    fn test_seek_order_is_cursor_then_identifier() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let builder = OrderingBuilder::new(&catalog);
        let seek = SeekSpec {
            field: "amount".into(),
            direction: Direction::Desc,
            value: serde_json::json!(10),
            id_value: None,
        };

        let terms = builder.seek_order(&mut ctx, &seek).unwrap();
        assert_eq!(render(&terms), vec!["amount DESC", "id DESC"]);
    }

    #[test]
    fn test_seek_order_on_identifier() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let builder = OrderingBuilder::new(&catalog);
        let seek = SeekSpec {
            field: "id".into(),
            direction: Direction::Asc,
            value: serde_json::json!(3),
            id_value: None,
        };

        let terms = builder.seek_order(&mut ctx, &seek).unwrap();
        assert_eq!(render(&terms), vec!["id ASC"]);
    }
}
