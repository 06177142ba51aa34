//! Plan execution.
//!
//! [`ExecutionEngine`] is the seam between the compiler and whatever runs the
//! plan. [`MemoryEngine`] runs plans against in-memory records: to-one
//! relations are nested objects and to-many relations are lists of objects.

use std::cmp::Ordering;
use std::collections::HashMap;

use parking_lot::RwLock;
use sieve_proto::{Direction, Object, Value};
use tracing::{debug, instrument};

use crate::error::Error;

use super::eval::{read_path, Evaluator, JoinedRow};
use super::expr::Join;
use super::planner::QueryPlan;
use super::projection::Projection;
use super::result::ResultSet;

/// Runs compiled plans.
pub trait ExecutionEngine: Send + Sync {
    /// Execute a plan.
    fn execute(&self, plan: &QueryPlan) -> Result<ResultSet, Error>;

    /// Execute a count plan.
    fn count(&self, plan: &QueryPlan) -> Result<u64, Error> {
        match self.execute(plan)? {
            ResultSet::Count(n) => Ok(n),
            other => Ok(other.len() as u64),
        }
    }
}

/// Reference engine over in-memory records, keyed by entity name.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: RwLock<HashMap<String, Vec<Object>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records for an entity.
    pub fn with_records(
        self,
        entity: impl Into<String>,
        records: impl IntoIterator<Item = Object>,
    ) -> Self {
        self.tables
            .write()
            .entry(entity.into())
            .or_default()
            .extend(records);
        self
    }

    pub fn insert(&self, entity: impl Into<String>, record: Object) {
        self.tables
            .write()
            .entry(entity.into())
            .or_default()
            .push(record);
    }

    /// Number of records stored for an entity.
    pub fn len(&self, entity: &str) -> usize {
        self.tables.read().get(entity).map_or(0, Vec::len)
    }
}

impl ExecutionEngine for MemoryEngine {
    #[instrument(skip_all, fields(entity = %plan.root_entity))]
    fn execute(&self, plan: &QueryPlan) -> Result<ResultSet, Error> {
        let roots = self
            .tables
            .read()
            .get(&plan.root_entity)
            .cloned()
            .unwrap_or_default();

        let rows = expand_joins(&plan.joins, roots);
        let restriction = plan.restriction();
        let mut matched = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(restriction) = &restriction {
                if Evaluator::predicate(restriction, &row)? != Some(true) {
                    continue;
                }
            }
            matched.push(row);
        }
        debug!(matched = matched.len(), "Applied restriction");

        if let Projection::Count { distinct } = plan.projection {
            return Ok(ResultSet::Count(count(plan, &matched, distinct)));
        }

        let mut units = if plan.is_grouped() {
            group(plan, matched)?
        } else {
            matched.into_iter().map(|row| vec![row]).collect()
        };

        sort_units(plan, &mut units)?;

        let mut records = Vec::with_capacity(units.len());
        for unit in &units {
            records.push(project(plan, unit)?);
        }

        if plan.distinct {
            records = distinct(plan, records);
        }
        paginate(&mut records, plan.offset, plan.limit);

        Ok(match plan.projection {
            Projection::Columns(_) => ResultSet::Rows(records),
            _ => ResultSet::Entities(records),
        })
    }
}

/// Bind each join in order. Rows without a target are dropped; to-many
/// targets produce one row per element.
fn expand_joins(joins: &[Join], roots: Vec<Object>) -> Vec<JoinedRow> {
    let mut rows: Vec<JoinedRow> = roots.into_iter().map(JoinedRow::new).collect();
    for join in joins {
        let mut expanded = Vec::with_capacity(rows.len());
        for row in rows {
            let target = row
                .source(join.parent)
                .map_or(Value::Null, |parent| read_path(parent, &join.attribute_path));
            match target {
                Value::Object(object) => {
                    let mut row = row;
                    row.joined.push(object);
                    expanded.push(row);
                }
                Value::List(items) => {
                    for item in items {
                        if let Value::Object(object) = item {
                            let mut bound = row.clone();
                            bound.joined.push(object);
                            expanded.push(bound);
                        }
                    }
                }
                _ => {}
            }
        }
        rows = expanded;
    }
    rows
}

fn count(plan: &QueryPlan, rows: &[JoinedRow], distinct: bool) -> u64 {
    if !distinct {
        return rows.len() as u64;
    }
    let mut seen: Vec<Value> = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.root.get(&plan.identifier).cloned().unwrap_or(Value::Null);
        if !seen.iter().any(|s| Evaluator::values_equal(s, &id)) {
            seen.push(id);
        }
    }
    seen.len() as u64
}

/// Partition rows by the group-by keys, in first-seen order. Without keys
/// every row lands in one group.
fn group(plan: &QueryPlan, rows: Vec<JoinedRow>) -> Result<Vec<Vec<JoinedRow>>, Error> {
    if plan.group_by.is_empty() {
        return Ok(vec![rows]);
    }

    let mut groups: Vec<(Vec<Value>, Vec<JoinedRow>)> = Vec::new();
    for row in rows {
        let key = plan
            .group_by
            .iter()
            .map(|e| Evaluator::expr(e, &row))
            .collect::<Result<Vec<_>, _>>()?;
        match groups.iter_mut().find(|(k, _)| keys_equal(k, &key)) {
            Some((_, members)) => members.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    Ok(groups.into_iter().map(|(_, members)| members).collect())
}

fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Evaluator::values_equal(x, y))
}

/// Sort by the plan's order terms. NULLs sort first.
fn sort_units(plan: &QueryPlan, units: &mut Vec<Vec<JoinedRow>>) -> Result<(), Error> {
    if plan.order_by.is_empty() {
        return Ok(());
    }

    let mut keyed = Vec::with_capacity(units.len());
    for unit in units.drain(..) {
        let key = plan
            .order_by
            .iter()
            .map(|term| Evaluator::expr_grouped(&term.expr, &unit))
            .collect::<Result<Vec<_>, _>>()?;
        keyed.push((key, unit));
    }

    keyed.sort_by(|(a, _), (b, _)| {
        for (term, (x, y)) in plan.order_by.iter().zip(a.iter().zip(b)) {
            let ord = Evaluator::sort_order(x, y);
            let ord = match term.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    units.extend(keyed.into_iter().map(|(_, unit)| unit));
    Ok(())
}

fn project(plan: &QueryPlan, unit: &[JoinedRow]) -> Result<Object, Error> {
    match &plan.projection {
        Projection::Columns(selections) => {
            let mut record = Object::with_capacity(selections.len());
            for (position, selection) in selections.iter().enumerate() {
                let value = Evaluator::expr_grouped(&selection.expr, unit)?;
                record.insert(selection.key(position), value);
            }
            Ok(record)
        }
        _ => Ok(unit.first().map(|row| row.root.clone()).unwrap_or_default()),
    }
}

/// Drop repeated results, keeping the first. Entities compare by identifier.
fn distinct(plan: &QueryPlan, records: Vec<Object>) -> Vec<Object> {
    let mut kept: Vec<Object> = Vec::with_capacity(records.len());
    for record in records {
        let duplicate = match plan.projection {
            Projection::Columns(_) => kept.contains(&record),
            _ => {
                let id = record.get(&plan.identifier);
                kept.iter().any(|k| match (k.get(&plan.identifier), id) {
                    (Some(a), Some(b)) => Evaluator::values_equal(a, b),
                    _ => *k == record,
                })
            }
        };
        if !duplicate {
            kept.push(record);
        }
    }
    kept
}

fn paginate(records: &mut Vec<Object>, offset: Option<u32>, limit: Option<u32>) {
    if let Some(offset) = offset {
        let offset = (offset as usize).min(records.len());
        records.drain(..offset);
    }
    if let Some(limit) = limit {
        records.truncate(limit as usize);
    }
}
