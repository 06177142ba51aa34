//! Join resolution for dotted field paths.
//!
//! A path such as `customer.address.city.name` is walked one segment at a
//! time. Relationship attributes add an inner join, embedded and composite-key
//! attributes are navigated on the same row, and the final segment is the
//! attribute read. Every prefix is resolved once per [`QueryContext`], so paths
//! sharing a prefix share its join.

use tracing::trace;

use crate::catalog::{FieldType, SchemaRegistry};
use crate::error::Error;

use super::context::{PathState, QueryContext};
use super::expr::{Expr, FieldRef, Source};

/// A fully resolved field path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    /// The attribute reference.
    pub field: FieldRef,
    /// Declared type of the terminal attribute.
    pub field_type: FieldType,
}

impl ResolvedPath {
    /// The attribute as a plan expression.
    pub fn expr(&self) -> Expr {
        Expr::Field(self.field.clone())
    }
}

/// Turns dotted paths into join chains and attribute references.
pub struct JoinResolver<'a> {
    registry: &'a dyn SchemaRegistry,
}

impl<'a> JoinResolver<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a dotted path from the context's root entity.
    pub fn resolve(&self, ctx: &mut QueryContext, path: &str) -> Result<ResolvedPath, Error> {
        let path = path.trim();
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::JoinResolutionFailure {
                path: path.to_string(),
                reason: "empty path segment".to_string(),
            });
        }

        let Some((terminal, parents)) = segments.split_last() else {
            return Err(Error::JoinResolutionFailure {
                path: path.to_string(),
                reason: "empty path".to_string(),
            });
        };

        let mut state = ctx.root_state();
        for (depth, segment) in parents.iter().enumerate() {
            let prefix = segments[..=depth].join(".");
            state = match ctx.cached_path(&prefix) {
                Some(cached) => cached.clone(),
                None => {
                    let next = self.step(ctx, &state, segment, &prefix, path)?;
                    ctx.cache_path(prefix, next.clone());
                    next
                }
            };
        }

        let owner = ctx.lookup_type(self.registry, &state.type_name)?;
        let field_type = owner
            .get_field(terminal)
            .map(|f| f.field_type.clone())
            .ok_or_else(|| Error::UnknownAttribute {
                entity: state.type_name.clone(),
                attribute: terminal.to_string(),
            })?;

        let mut field_path = state.hops;
        field_path.push(terminal.to_string());

        Ok(ResolvedPath {
            field: FieldRef {
                source: state.source,
                path: field_path,
                qualified: path.to_string(),
            },
            field_type,
        })
    }

    fn step(
        &self,
        ctx: &mut QueryContext,
        state: &PathState,
        segment: &str,
        prefix: &str,
        path: &str,
    ) -> Result<PathState, Error> {
        let owner = ctx.lookup_type(self.registry, &state.type_name)?;
        let field_type = owner
            .get_field(segment)
            .map(|f| f.field_type.clone())
            .ok_or_else(|| Error::UnknownAttribute {
                entity: state.type_name.clone(),
                attribute: segment.to_string(),
            })?;

        let mut hops = state.hops.clone();
        hops.push(segment.to_string());

        match field_type {
            FieldType::Embedded { type_name } | FieldType::CompositeKey { type_name } => {
                Ok(PathState {
                    source: state.source,
                    type_name,
                    hops,
                })
            }
            FieldType::Relation { entity, .. } => {
                let handle = ctx.add_join(state.source, hops, entity.clone(), prefix);
                trace!(prefix = %prefix, entity = %entity, join = handle.index(), "Added join");
                Ok(PathState {
                    source: Source::Join(handle),
                    type_name: entity,
                    hops: Vec::new(),
                })
            }
            other => Err(Error::JoinResolutionFailure {
                path: path.to_string(),
                reason: format!("'{segment}' is a {other} attribute"),
            }),
        }
    }
}
