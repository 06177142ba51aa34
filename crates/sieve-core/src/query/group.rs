//! GROUP BY construction.

use tracing::warn;

use crate::catalog::SchemaRegistry;

use super::context::QueryContext;
use super::expr::Expr;
use super::join::JoinResolver;

pub struct GroupByBuilder<'a> {
    resolver: JoinResolver<'a>,
}

impl<'a> GroupByBuilder<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry) -> Self {
        Self {
            resolver: JoinResolver::new(registry),
        }
    }

    /// Resolve each group-by path. Blank entries and failures are skipped.
    pub fn build(&self, ctx: &mut QueryContext, group_by: &[String]) -> Vec<Expr> {
        group_by
            .iter()
            .filter(|path| !path.trim().is_empty())
            .filter_map(|path| match self.resolver.resolve(ctx, path) {
                Ok(resolved) => Some(resolved.expr()),
                Err(e) => {
                    warn!(group_by = %path, error = %e, "Skipping group-by entry");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::invoice_catalog;

    #[test]
    fn test_group_by_paths() {
        let catalog = invoice_catalog();
        let mut ctx = QueryContext::new(&catalog, "Invoice").unwrap();
        let groups = GroupByBuilder::new(&catalog).build(
            &mut ctx,
            &["status".into(), " ".into(), "customer.name".into(), "bogus".into()],
        );

        let rendered: Vec<String> = groups.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["status", "customer.name"]);
    }
}
