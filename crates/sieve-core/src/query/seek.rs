//! Keyset (seek) pagination.

use sieve_proto::{Comparator, Direction, SeekSpec};

use crate::catalog::SchemaRegistry;
use crate::config::CompilerConfig;
use crate::error::Error;

use super::coerce::{CoercionContext, ValueCoercer};
use super::context::QueryContext;
use super::expr::{CompareOp, Predicate};
use super::join::JoinResolver;

/// Builds the predicate selecting the rows after a cursor.
pub struct SeekPaginationBuilder<'a> {
    resolver: JoinResolver<'a>,
    coercer: ValueCoercer<'a>,
}

impl<'a> SeekPaginationBuilder<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry, config: &'a CompilerConfig) -> Self {
        Self {
            resolver: JoinResolver::new(registry),
            coercer: ValueCoercer::new(&config.date_time),
        }
    }

    /// `f > v OR (f = v AND id > idv)` ascending, `<` descending. Without an id
    /// value only the strict comparison on the cursor field.
    pub fn build(&self, ctx: &mut QueryContext, seek: &SeekSpec) -> Result<Predicate, Error> {
        let op = match seek.direction {
            Direction::Asc => CompareOp::Gt,
            Direction::Desc => CompareOp::Lt,
        };
        let comparator = match seek.direction {
            Direction::Asc => Comparator::Gt,
            Direction::Desc => Comparator::Lt,
        };
        let coercion = CoercionContext::verbatim(comparator);

        let cursor = self.resolver.resolve(ctx, &seek.field)?;
        let value = self.coercer.coerce(&seek.value, &cursor.field_type, &coercion);
        let after = Predicate::compare(op, cursor.expr(), value.clone());

        let Some(id_value) = seek.id_value.as_ref().filter(|v| !v.is_null()) else {
            return Ok(after);
        };

        let identifier = ctx.identifier().to_string();
        let id = self.resolver.resolve(ctx, &identifier)?;
        let id_value = self.coercer.coerce(id_value, &id.field_type, &coercion);

        Ok(Predicate::Or(vec![
            after,
            Predicate::And(vec![
                Predicate::compare(CompareOp::Eq, cursor.expr(), value),
                Predicate::compare(op, id.expr(), id_value),
            ]),
        ]))
    }
}
