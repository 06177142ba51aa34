//! Filter compilation.
//!
//! Each filter entry (field path plus [`Condition`]) becomes one
//! [`Predicate`]. Leaf comparators resolve the field and coerce their values
//! against its declared type; `AND`, `OR` and `CASE` recurse into their
//! operands and resolve fields only where a leaf needs one.

use chrono::{NaiveDateTime, NaiveTime, TimeZone, Utc};
use indexmap::IndexMap;
use sieve_proto::{Comparator, Condition, Operand, Value};
use tracing::warn;

use crate::catalog::{FieldType, SchemaRegistry};
use crate::config::CompilerConfig;
use crate::error::Error;

use super::coerce::{end_of_day, CoercionContext, ValueCoercer};
use super::context::QueryContext;
use super::expr::{CompareOp, Expr, Predicate};
use super::join::{JoinResolver, ResolvedPath};

/// Anchoring of a `LIKE` pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeMode {
    Contains,
    StartsWith,
    EndsWith,
}

/// Compiles filter conditions into predicates.
pub struct PredicateCompiler<'a> {
    resolver: JoinResolver<'a>,
    coercer: ValueCoercer<'a>,
    config: &'a CompilerConfig,
}

impl<'a> PredicateCompiler<'a> {
    pub fn new(registry: &'a dyn SchemaRegistry, config: &'a CompilerConfig) -> Self {
        Self {
            resolver: JoinResolver::new(registry),
            coercer: ValueCoercer::new(&config.date_time),
            config,
        }
    }

    /// Compile every filter entry, in document order.
    ///
    /// An entry that fails is logged and contributes no predicate.
    pub fn compile_filters(
        &self,
        ctx: &mut QueryContext,
        filters: &IndexMap<String, Condition>,
    ) -> Vec<Predicate> {
        let mut predicates = Vec::with_capacity(filters.len());
        for (field, condition) in filters {
            match self.compile(ctx, field, condition, None) {
                Ok(predicate) => predicates.push(predicate),
                Err(e) => {
                    warn!(field = %field, comparator = %condition.comparator, error = %e, "Dropping filter");
                }
            }
        }
        predicates
    }

    /// Compile one condition on `field`.
    ///
    /// `enclosing` is the composite or pattern condition this one is nested
    /// in, if any.
    pub fn compile(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        condition: &Condition,
        enclosing: Option<&Condition>,
    ) -> Result<Predicate, Error> {
        condition.validate()?;

        match condition.comparator {
            Comparator::And | Comparator::Or => self.composite(ctx, field, condition),
            Comparator::Case => self.case(ctx, field, condition),
            _ => {
                let resolved = self.resolver.resolve(ctx, field)?;
                self.leaf(ctx, field, &resolved, condition, enclosing)
            }
        }
    }

    fn leaf(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        resolved: &ResolvedPath,
        condition: &Condition,
        enclosing: Option<&Condition>,
    ) -> Result<Predicate, Error> {
        let comparator = condition.comparator;
        let target = &resolved.field_type;

        match comparator {
            Comparator::IsNull => return Ok(Predicate::IsNull(resolved.expr())),
            Comparator::IsNotNull => return Ok(Predicate::IsNotNull(resolved.expr())),
            Comparator::IsEmpty | Comparator::IsNotEmpty => {
                if !target.is_to_many() {
                    return Err(unsupported(comparator, field, target));
                }
                return Ok(if comparator == Comparator::IsEmpty {
                    Predicate::IsEmpty(resolved.expr())
                } else {
                    Predicate::IsNotEmpty(resolved.expr())
                });
            }
            Comparator::StartsWith if target.is_temporal() => {
                return self.day_ranges(ctx, field, resolved, condition, enclosing);
            }
            Comparator::Like
            | Comparator::StartsWith
            | Comparator::EndsWith
            | Comparator::NotLike => {
                if !target.is_string_like() {
                    return Err(unsupported(comparator, field, target));
                }
                return self.patterns(ctx, field, resolved, condition, enclosing);
            }
            _ => {}
        }

        let values = self.coerce_values(field, target, condition)?;
        let column = comparison_column(resolved, condition);

        let predicate = match comparator {
            Comparator::Ne => match values.len() {
                0 => Predicate::IsNotNull(resolved.expr()),
                1 => Predicate::compare(CompareOp::Ne, column, first(values)),
                _ => Predicate::In {
                    expr: column,
                    values,
                    negated: true,
                },
            },
            Comparator::Gt | Comparator::Ge | Comparator::Lt | Comparator::Le => {
                match values.into_iter().next() {
                    Some(value) if value.is_comparable() => {
                        Predicate::compare(ordering_op(comparator), column, value)
                    }
                    Some(value) => Predicate::compare(CompareOp::Eq, column, value),
                    None => Predicate::IsNull(resolved.expr()),
                }
            }
            Comparator::In | Comparator::NotIn => {
                let negated = comparator == Comparator::NotIn;
                if values.is_empty() {
                    if negated {
                        Predicate::IsNotNull(resolved.expr())
                    } else {
                        Predicate::IsNull(resolved.expr())
                    }
                } else {
                    Predicate::In {
                        expr: column,
                        values,
                        negated,
                    }
                }
            }
            Comparator::Between => {
                if values.len() != 2 {
                    return Err(sieve_proto::Error::InvalidConditionArity {
                        comparator,
                        expected: "exactly 2 non-null",
                        actual: values.len(),
                    }
                    .into());
                }
                let mut bounds = values.into_iter();
                let low = bounds.next().unwrap_or(Value::Null);
                let high = bounds.next().unwrap_or(Value::Null);
                Predicate::Between {
                    expr: column,
                    low,
                    high,
                }
            }
            // EQ, ELSE, and anything without a dedicated arm compare for equality.
            _ => match values.into_iter().next() {
                Some(value) => Predicate::compare(CompareOp::Eq, column, value),
                None => Predicate::IsNull(resolved.expr()),
            },
        };

        Ok(predicate)
    }

    /// Coerce a leaf condition's literals, flattening arrays and skipping nulls.
    fn coerce_values(
        &self,
        field: &str,
        target: &FieldType,
        condition: &Condition,
    ) -> Result<Vec<Value>, Error> {
        let mut values = Vec::with_capacity(condition.values.len());
        for (index, operand) in condition.values.iter().enumerate() {
            let Operand::Literal(raw) = operand else {
                return Err(non_literal(condition.comparator, field));
            };
            let ctx = CoercionContext::for_condition(condition, index);
            for item in flatten(raw) {
                if !is_null_literal(item) {
                    values.push(self.coercer.coerce(item, target, &ctx));
                }
            }
        }
        Ok(values)
    }

    /// `LIKE`, `STARTS_WITH`, `ENDS_WITH` and `NOT_LIKE` on string attributes.
    fn patterns(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        resolved: &ResolvedPath,
        condition: &Condition,
        enclosing: Option<&Condition>,
    ) -> Result<Predicate, Error> {
        let mode = match condition.comparator {
            Comparator::Like => LikeMode::Contains,
            Comparator::EndsWith => LikeMode::EndsWith,
            _ => LikeMode::StartsWith,
        };
        let negated = is_negated(condition, enclosing);
        let column = if condition.upper {
            Expr::upper(resolved.expr())
        } else {
            resolved.expr()
        };
        let escape = self.config.like_escape;

        self.each_value(ctx, field, condition, enclosing, |raw, index| {
            let text = match raw {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let normalized = self
                .coercer
                .normalize(&text, &CoercionContext::for_condition(condition, index));
            let escaped = escape_like(&normalized, escape);
            let pattern = match mode {
                LikeMode::Contains => format!("%{escaped}%"),
                LikeMode::StartsWith => format!("{escaped}%"),
                LikeMode::EndsWith => format!("%{escaped}"),
            };
            let like = Predicate::Like {
                expr: column.clone(),
                pattern,
                escape,
            };
            Ok(if negated { Predicate::negate(like) } else { like })
        })
    }

    /// `STARTS_WITH` on a temporal attribute: the whole day of each value.
    fn day_ranges(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        resolved: &ResolvedPath,
        condition: &Condition,
        enclosing: Option<&Condition>,
    ) -> Result<Predicate, Error> {
        let negated = is_negated(condition, enclosing);
        let target = &resolved.field_type;
        let offset = self.config.date_time.offset();
        let coercion = CoercionContext::verbatim(Comparator::StartsWith);

        self.each_value(ctx, field, condition, enclosing, |raw, _| {
            let day = match self.coercer.try_coerce(raw, target, &coercion)? {
                Value::Timestamp(instant) => {
                    let local = instant.with_timezone(&offset).date_naive();
                    let at = |time: NaiveTime| {
                        offset
                            .from_local_datetime(&local.and_time(time))
                            .single()
                            .map(|dt| dt.with_timezone(&Utc))
                            .ok_or_else(|| unsupported(condition.comparator, field, target))
                    };
                    (
                        Value::Timestamp(at(NaiveTime::MIN)?),
                        Value::Timestamp(at(end_of_day())?),
                    )
                }
                Value::DateTime(local) => (
                    Value::DateTime(NaiveDateTime::new(local.date(), NaiveTime::MIN)),
                    Value::DateTime(NaiveDateTime::new(local.date(), end_of_day())),
                ),
                Value::Date(date) => (Value::Date(date), Value::Date(date)),
                _ => return Err(unsupported(condition.comparator, field, target)),
            };
            let range = Predicate::Between {
                expr: resolved.expr(),
                low: day.0,
                high: day.1,
            };
            Ok(if negated { Predicate::negate(range) } else { range })
        })
    }

    /// Run `literal` on each literal value of a pattern condition and recurse
    /// into nested operands. Parts are OR-ed inside an `OR`, AND-ed otherwise.
    fn each_value<F>(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        condition: &Condition,
        enclosing: Option<&Condition>,
        mut literal: F,
    ) -> Result<Predicate, Error>
    where
        F: FnMut(&serde_json::Value, usize) -> Result<Predicate, Error>,
    {
        let mut parts = Vec::new();
        for (index, operand) in condition.values.iter().enumerate() {
            match operand {
                Operand::Literal(raw) => {
                    for item in flatten(raw) {
                        if !is_null_literal(item) {
                            parts.push(literal(item, index)?);
                        }
                    }
                }
                Operand::Condition(nested) => {
                    parts.push(self.compile(ctx, field, nested, Some(condition))?);
                }
                Operand::Fields(fields) => {
                    for (key, value) in fields {
                        parts.push(self.compile_entry(ctx, key, value, condition)?);
                    }
                }
            }
        }

        if parts.is_empty() {
            return Err(Error::Protocol(sieve_proto::Error::InvalidCondition(format!(
                "{} on '{field}' has no non-null values",
                condition.comparator
            ))));
        }

        Ok(if enclosing.is_some_and(|e| e.comparator == Comparator::Or) {
            Predicate::or(parts)
        } else {
            Predicate::and(parts)
        })
    }

    /// `AND` / `OR`: every operand applies to `field` unless it names its own.
    fn composite(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        condition: &Condition,
    ) -> Result<Predicate, Error> {
        let mut parts = Vec::with_capacity(condition.values.len());
        for operand in &condition.values {
            match operand {
                Operand::Condition(nested) => {
                    parts.push(self.compile(ctx, field, nested, Some(condition))?);
                }
                Operand::Fields(fields) => {
                    if let Some(predicate) = self.compile_fields(ctx, fields, condition)? {
                        parts.push(predicate);
                    }
                }
                Operand::Literal(raw) => {
                    parts.push(self.compile(ctx, field, &shorthand(raw, condition), Some(condition))?);
                }
            }
        }
        Ok(connect(condition.comparator, parts))
    }

    /// `CASE`: the first operand is the result, the rest are branches.
    fn case(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        condition: &Condition,
    ) -> Result<Predicate, Error> {
        let Some((result, branches)) = condition.values.split_first() else {
            return Err(non_literal(condition.comparator, field));
        };

        let then = match result {
            Operand::Literal(raw) => Expr::Literal(Value::from(raw)),
            Operand::Condition(nested) => {
                Expr::Predicate(Box::new(self.compile(ctx, field, nested, Some(condition))?))
            }
            Operand::Fields(fields) => {
                let predicate = self
                    .compile_fields(ctx, fields, condition)?
                    .unwrap_or_else(|| Predicate::And(Vec::new()));
                Expr::Predicate(Box::new(predicate))
            }
        };

        let mut guards = Vec::new();
        let mut otherwise = Vec::new();
        for branch in branches {
            match branch {
                Operand::Condition(nested) => {
                    let predicate = self.compile(ctx, field, nested, Some(condition))?;
                    if nested.comparator == Comparator::Else {
                        otherwise.push(predicate);
                    } else {
                        guards.push(predicate);
                    }
                }
                Operand::Fields(fields) => {
                    for (key, value) in fields {
                        let predicate = self.compile_entry(ctx, key, value, condition)?;
                        match value {
                            Operand::Condition(c) if c.comparator == Comparator::Else => {
                                otherwise.push(predicate)
                            }
                            _ => guards.push(predicate),
                        }
                    }
                }
                Operand::Literal(raw) => {
                    guards.push(self.compile(ctx, field, &shorthand(raw, condition), Some(condition))?);
                }
            }
        }

        if guards.is_empty() {
            return Err(Error::Protocol(sieve_proto::Error::InvalidCondition(format!(
                "CASE on '{field}' has no WHEN branch"
            ))));
        }

        let otherwise = (!otherwise.is_empty())
            .then(|| Box::new(Expr::Predicate(Box::new(Predicate::and(otherwise)))));

        Ok(Predicate::IsTrue(Expr::Case {
            when: Box::new(Predicate::and(guards)),
            then: Box::new(then),
            otherwise,
        }))
    }

    /// One entry of a field map nested in `parent`.
    fn compile_entry(
        &self,
        ctx: &mut QueryContext,
        field: &str,
        operand: &Operand,
        parent: &Condition,
    ) -> Result<Predicate, Error> {
        match operand {
            Operand::Condition(nested) => self.compile(ctx, field, nested, Some(parent)),
            Operand::Literal(raw) => self.compile(ctx, field, &shorthand(raw, parent), Some(parent)),
            Operand::Fields(fields) => Ok(self
                .compile_fields(ctx, fields, parent)?
                .unwrap_or_else(|| Predicate::And(Vec::new()))),
        }
    }

    fn compile_fields(
        &self,
        ctx: &mut QueryContext,
        fields: &IndexMap<String, Operand>,
        parent: &Condition,
    ) -> Result<Option<Predicate>, Error> {
        if fields.is_empty() {
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            parts.push(self.compile_entry(ctx, key, value, parent)?);
        }
        Ok(Some(connect(parent.comparator, parts)))
    }
}

/// Escape `%`, `_` and the escape character itself.
pub fn escape_like(text: &str, escape: char) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || c == '_' || c == escape {
            escaped.push(escape);
        }
        escaped.push(c);
    }
    escaped
}

/// Column expression matching the value normalization of a string condition.
fn comparison_column(resolved: &ResolvedPath, condition: &Condition) -> Expr {
    let column = resolved.expr();
    if !resolved.field_type.is_string_like() {
        return column;
    }
    let column = if condition.trim { Expr::trim(column) } else { column };
    if condition.upper {
        Expr::upper(column)
    } else {
        column
    }
}

fn is_negated(condition: &Condition, enclosing: Option<&Condition>) -> bool {
    match condition.comparator {
        Comparator::NotLike => true,
        Comparator::StartsWith | Comparator::EndsWith => {
            enclosing.is_some_and(|e| e.comparator == Comparator::NotLike)
        }
        _ => false,
    }
}

/// A bare literal inside a composite: `EQ`, or `IN` for an array.
fn shorthand(raw: &serde_json::Value, parent: &Condition) -> Condition {
    let condition = match raw {
        serde_json::Value::Array(items) => Condition::new(
            Comparator::In,
            items.iter().cloned().map(Operand::Literal).collect(),
        ),
        other => Condition::new(Comparator::Eq, vec![Operand::Literal(other.clone())]),
    };
    condition.with_trim(parent.trim).with_upper(parent.upper)
}

fn connect(comparator: Comparator, parts: Vec<Predicate>) -> Predicate {
    if comparator == Comparator::Or {
        Predicate::or(parts)
    } else {
        Predicate::and(parts)
    }
}

fn flatten(raw: &serde_json::Value) -> Vec<&serde_json::Value> {
    match raw {
        serde_json::Value::Array(items) => items.iter().flat_map(flatten).collect(),
        other => vec![other],
    }
}

fn is_null_literal(raw: &serde_json::Value) -> bool {
    match raw {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().eq_ignore_ascii_case("null"),
        _ => false,
    }
}

fn first(values: Vec<Value>) -> Value {
    values.into_iter().next().unwrap_or(Value::Null)
}

fn ordering_op(comparator: Comparator) -> CompareOp {
    match comparator {
        Comparator::Gt => CompareOp::Gt,
        Comparator::Ge => CompareOp::Ge,
        Comparator::Lt => CompareOp::Lt,
        _ => CompareOp::Le,
    }
}

fn unsupported(comparator: Comparator, field: &str, target: &FieldType) -> Error {
    Error::UnsupportedComparator {
        comparator,
        field: field.to_string(),
        field_type: target.to_string(),
    }
}

fn non_literal(comparator: Comparator, field: &str) -> Error {
    Error::Protocol(sieve_proto::Error::InvalidCondition(format!(
        "{comparator} on '{field}' expects literal values"
    )))
}
