//! Expression and predicate evaluation over in-memory rows.
//!
//! Predicates follow SQL three-valued logic: `None` is UNKNOWN, and a row is
//! kept only when its restriction evaluates to `Some(true)`.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use sieve_proto::{Object, Value};
use tracing::debug;

use crate::error::Error;

use super::expr::{is_aggregate, CompareOp, Expr, FieldRef, Predicate, Source};

/// A root record with the records bound by each join, indexed by join handle.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub root: Object,
    pub joined: Vec<Object>,
}

impl JoinedRow {
    pub fn new(root: Object) -> Self {
        Self {
            root,
            joined: Vec::new(),
        }
    }

    /// The record a source refers to.
    pub fn source(&self, source: Source) -> Option<&Object> {
        match source {
            Source::Root => Some(&self.root),
            Source::Join(handle) => self.joined.get(handle.index()),
        }
    }
}

/// Read a value by following `path` through nested objects.
pub fn read_path(object: &Object, path: &[String]) -> Value {
    let Some((last, hops)) = path.split_last() else {
        return Value::Null;
    };
    let mut current = object;
    for hop in hops {
        match current.get(hop) {
            Some(Value::Object(nested)) => current = nested,
            _ => return Value::Null,
        }
    }
    current.get(last).cloned().unwrap_or(Value::Null)
}

/// Evaluates plan expressions against rows.
pub struct Evaluator;

impl Evaluator {
    /// Read a field of a row. Missing fields read as NULL.
    pub fn field(field: &FieldRef, row: &JoinedRow) -> Value {
        match row.source(field.source) {
            Some(object) => read_path(object, &field.path),
            None => Value::Null,
        }
    }

    /// Evaluate a scalar expression on one row.
    pub fn expr(expr: &Expr, row: &JoinedRow) -> Result<Value, Error> {
        match expr {
            Expr::Field(field) => Ok(Self::field(field, row)),
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Upper(inner) => Ok(upper(Self::expr(inner, row)?)),
            Expr::Trim(inner) => Ok(trim(Self::expr(inner, row)?)),
            Expr::Length(inner) => Ok(length(Self::expr(inner, row)?)),
            Expr::Function { name, args } => {
                if is_aggregate(name) {
                    return Err(Error::Execution(format!(
                        "aggregate {name} used outside a grouped query"
                    )));
                }
                let args = args
                    .iter()
                    .map(|a| Self::expr(a, row))
                    .collect::<Result<Vec<_>, _>>()?;
                scalar_function(name, args)
            }
            Expr::Case {
                when,
                then,
                otherwise,
            } => {
                if Self::predicate(when, row)? == Some(true) {
                    Self::expr(then, row)
                } else {
                    match otherwise {
                        Some(otherwise) => Self::expr(otherwise, row),
                        None => Ok(Value::Null),
                    }
                }
            }
            Expr::Predicate(p) => Ok(Self::predicate(p, row)?.map_or(Value::Null, Value::Bool)),
        }
    }

    /// Evaluate an expression over a group of rows.
    ///
    /// Aggregates consume every row of the group; anything else is read from
    /// the first row, which is where grouping keys live.
    pub fn expr_grouped(expr: &Expr, group: &[JoinedRow]) -> Result<Value, Error> {
        match expr {
            Expr::Function { name, args } if is_aggregate(name) => {
                let mut values = Vec::with_capacity(group.len());
                for row in group {
                    let value = match args.first() {
                        Some(arg) => Self::expr(arg, row)?,
                        None => Value::Bool(true),
                    };
                    values.push(value);
                }
                aggregate(name, values)
            }
            Expr::Function { name, args } => {
                let args = args
                    .iter()
                    .map(|a| Self::expr_grouped(a, group))
                    .collect::<Result<Vec<_>, _>>()?;
                scalar_function(name, args)
            }
            Expr::Upper(inner) => Ok(upper(Self::expr_grouped(inner, group)?)),
            Expr::Trim(inner) => Ok(trim(Self::expr_grouped(inner, group)?)),
            Expr::Length(inner) => Ok(length(Self::expr_grouped(inner, group)?)),
            other => match group.first() {
                Some(row) => Self::expr(other, row),
                None => Ok(Value::Null),
            },
        }
    }

    /// Evaluate a predicate. `None` is UNKNOWN.
    pub fn predicate(predicate: &Predicate, row: &JoinedRow) -> Result<Option<bool>, Error> {
        match predicate {
            Predicate::Compare { op, left, right } => {
                let left = Self::expr(left, row)?;
                let right = Self::expr(right, row)?;
                if left.is_null() || right.is_null() {
                    return Ok(None);
                }
                Ok(match op {
                    CompareOp::Eq => Some(Self::values_equal(&left, &right)),
                    CompareOp::Ne => Some(!Self::values_equal(&left, &right)),
                    CompareOp::Lt => Self::compare_values(&left, &right).map(Ordering::is_lt),
                    CompareOp::Le => Self::compare_values(&left, &right).map(Ordering::is_le),
                    CompareOp::Gt => Self::compare_values(&left, &right).map(Ordering::is_gt),
                    CompareOp::Ge => Self::compare_values(&left, &right).map(Ordering::is_ge),
                })
            }
            Predicate::In {
                expr,
                values,
                negated,
            } => {
                let value = Self::expr(expr, row)?;
                if value.is_null() {
                    return Ok(None);
                }
                let found = values.iter().any(|v| Self::values_equal(&value, v));
                Ok(Some(found != *negated))
            }
            Predicate::Between { expr, low, high } => {
                let value = Self::expr(expr, row)?;
                if value.is_null() {
                    return Ok(None);
                }
                let above = Self::compare_values(&value, low).map(Ordering::is_ge);
                let below = Self::compare_values(&value, high).map(Ordering::is_le);
                Ok(and3([above, below]))
            }
            Predicate::Like {
                expr,
                pattern,
                escape,
            } => match Self::expr(expr, row)? {
                Value::Null => Ok(None),
                Value::String(s) => Ok(Some(Self::like_match(&s, pattern, *escape))),
                _ => Ok(Some(false)),
            },
            Predicate::IsNull(expr) => Ok(Some(Self::expr(expr, row)?.is_null())),
            Predicate::IsNotNull(expr) => Ok(Some(!Self::expr(expr, row)?.is_null())),
            Predicate::IsEmpty(expr) => Ok(Some(is_empty(&Self::expr(expr, row)?))),
            Predicate::IsNotEmpty(expr) => Ok(Some(!is_empty(&Self::expr(expr, row)?))),
            Predicate::IsTrue(expr) => Ok(Some(Self::expr(expr, row)? == Value::Bool(true))),
            Predicate::And(parts) => {
                let mut results = Vec::with_capacity(parts.len());
                for part in parts {
                    let result = Self::predicate(part, row)?;
                    if result == Some(false) {
                        return Ok(Some(false));
                    }
                    results.push(result);
                }
                Ok(and3(results))
            }
            Predicate::Or(parts) => {
                let mut unknown = false;
                for part in parts {
                    match Self::predicate(part, row)? {
                        Some(true) => return Ok(Some(true)),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                Ok(if unknown { None } else { Some(false) })
            }
            Predicate::Not(inner) => Ok(Self::predicate(inner, row)?.map(|b| !b)),
        }
    }

    /// Check if two non-null values are equal, across numeric representations.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            _ if a.is_numeric() && b.is_numeric() => {
                Self::compare_values(a, b) == Some(Ordering::Equal)
            }
            _ => a == b,
        }
    }

    /// Compare two values, returning their ordering if comparable.
    pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Decimal(_), _) | (_, Value::Decimal(_))
                if a.is_numeric() && b.is_numeric() =>
            {
                Some(a.as_decimal()?.cmp(&b.as_decimal()?))
            }
            _ if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: NULLs first, incomparable values equal.
    pub fn sort_order(a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Self::compare_values(a, b).unwrap_or(Ordering::Equal),
        }
    }

    /// Match a string against a SQL LIKE pattern.
    ///
    /// `%` matches any run of characters, `_` exactly one, and `escape`
    /// makes the next pattern character literal.
    pub fn like_match(value: &str, pattern: &str, escape: char) -> bool {
        let value: Vec<char> = value.chars().collect();
        let pattern: Vec<char> = pattern.chars().collect();
        like_from(&value, &pattern, escape)
    }
}

fn like_from(value: &[char], pattern: &[char], escape: char) -> bool {
    let Some((&p, rest)) = pattern.split_first() else {
        return value.is_empty();
    };

    if p == escape {
        return match (rest.split_first(), value.split_first()) {
            (Some((&literal, rest)), Some((&c, tail))) if literal == c => {
                like_from(tail, rest, escape)
            }
            _ => false,
        };
    }

    match p {
        '%' => (0..=value.len()).any(|skip| like_from(&value[skip..], rest, escape)),
        '_' => !value.is_empty() && like_from(&value[1..], rest, escape),
        _ => match value.split_first() {
            Some((&c, tail)) if c == p => like_from(tail, rest, escape),
            _ => false,
        },
    }
}

fn and3(results: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for result in results {
        match result {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown {
        None
    } else {
        Some(true)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::List(items) => items.is_empty(),
        _ => false,
    }
}

fn upper(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_uppercase()),
        other => other,
    }
}

fn trim(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other,
    }
}

fn length(value: Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::Int(s.chars().count() as i64),
        other => Value::Int(other.to_string().chars().count() as i64),
    }
}

fn scalar_function(name: &str, args: Vec<Value>) -> Result<Value, Error> {
    let first = || args.first().cloned().unwrap_or(Value::Null);
    match name.to_ascii_lowercase().as_str() {
        "upper" => Ok(upper(first())),
        "lower" => Ok(match first() {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        }),
        "trim" => Ok(trim(first())),
        "length" => Ok(length(first())),
        "concat" => {
            if args.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            Ok(Value::String(args.iter().map(ToString::to_string).collect()))
        }
        "coalesce" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        "abs" => Ok(match first() {
            Value::Int(i) => Value::Int(i.abs()),
            Value::Float(f) => Value::Float(f.abs()),
            Value::Decimal(d) => Value::Decimal(d.abs()),
            other => other,
        }),
        _ => Err(Error::UnsupportedFunction(name.to_string())),
    }
}

fn aggregate(name: &str, values: Vec<Value>) -> Result<Value, Error> {
    let present: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    match name.to_ascii_lowercase().as_str() {
        "count" => Ok(Value::Int(present.len() as i64)),
        "sum" => Ok(sum(&present)?.unwrap_or(Value::Null)),
        "avg" => {
            if present.is_empty() {
                return Ok(Value::Null);
            }
            let count = present.len() as i64;
            Ok(match sum(&present)? {
                Some(Value::Int(total)) => Value::Float(total as f64 / count as f64),
                Some(Value::Decimal(total)) => Value::Decimal(total / Decimal::from(count)),
                Some(Value::Float(total)) => Value::Float(total / count as f64),
                _ => Value::Null,
            })
        }
        "min" => Ok(present
            .into_iter()
            .min_by(Evaluator::sort_order)
            .unwrap_or(Value::Null)),
        "max" => Ok(present
            .into_iter()
            .max_by(Evaluator::sort_order)
            .unwrap_or(Value::Null)),
        _ => Err(Error::UnsupportedFunction(name.to_string())),
    }
}

/// Sum numeric values, widening to the broadest representation seen.
///
/// An integer sum that overflows `i64` is redone in decimal; a decimal sum
/// that overflows is an execution error.
fn sum(values: &[Value]) -> Result<Option<Value>, Error> {
    if values.is_empty() {
        return Ok(None);
    }

    let integers = values.iter().all(|v| matches!(v, Value::Int(_)));
    if integers {
        let total = values
            .iter()
            .filter_map(Value::as_i64)
            .try_fold(0i64, i64::checked_add);
        match total {
            Some(total) => return Ok(Some(Value::Int(total))),
            None => debug!(values = values.len(), "Integer sum overflows, widening to decimal"),
        }
    }

    if integers || values.iter().any(|v| matches!(v, Value::Decimal(_))) {
        let mut total = Decimal::ZERO;
        for value in values {
            let Some(value) = value.as_decimal() else {
                return Ok(None);
            };
            total = total
                .checked_add(value)
                .ok_or_else(|| Error::Execution("decimal sum overflows".to_string()))?;
        }
        return Ok(Some(Value::Decimal(total)));
    }

    let total: f64 = values.iter().filter_map(Value::as_f64).sum();
    Ok(Some(Value::Float(total)))
}
