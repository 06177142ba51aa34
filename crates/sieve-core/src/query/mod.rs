//! Query compilation and execution.
//!
//! [`QueryCompiler`] turns a [`SearchCriteria`](sieve_proto::SearchCriteria)
//! into a [`QueryPlan`]; an [`ExecutionEngine`] runs the plan.

mod coerce;
mod context;
mod eval;
mod executor;
mod expr;
mod group;
mod join;
mod ordering;
mod planner;
mod predicate;
mod projection;
mod result;
mod seek;

#[cfg(test)]
pub(crate) mod fixtures;

pub use coerce::{CoercionContext, ValueCoercer};
pub use context::{PathState, QueryContext};
pub use eval::{Evaluator, JoinedRow};
pub use executor::{ExecutionEngine, MemoryEngine};
pub use expr::{
    is_aggregate, sql_literal, CompareOp, Expr, FieldRef, Join, JoinHandle, OrderTerm, Predicate,
    Selection, Source, AGGREGATE_FUNCTIONS,
};
pub use group::GroupByBuilder;
pub use join::{JoinResolver, ResolvedPath};
pub use ordering::{split_order_key, OrderingBuilder};
pub use planner::{QueryCompiler, QueryPlan, RowShape};
pub use predicate::{escape_like, PredicateCompiler};
pub use projection::{Projection, ProjectionBuilder};
pub use result::ResultSet;
pub use seek::SeekPaginationBuilder;
