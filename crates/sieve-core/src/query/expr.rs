//! Plan expressions and predicates.
//!
//! Everything here is plain data: the compiler builds it, an execution engine
//! interprets it. `Display` renders an SQL-like form used in logs and tests.

use std::fmt;

use sieve_proto::{Direction, Value};

/// Identity of a join node within one plan.
///
/// Two paths sharing a prefix resolve to equal handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinHandle(pub(crate) usize);

impl JoinHandle {
    /// Position of the join in [`QueryPlan::joins`](super::QueryPlan::joins).
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Row a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// The root entity.
    Root,
    /// A joined entity.
    Join(JoinHandle),
}

/// An inner join through a relationship attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub handle: JoinHandle,
    /// Row the relationship is read from.
    pub parent: Source,
    /// Embedded hops followed by the relationship attribute.
    pub attribute_path: Vec<String>,
    /// Target entity.
    pub entity: String,
    /// Dotted path from the root that produced this join.
    pub prefix: String,
}

/// An attribute read from a source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub source: Source,
    /// Embedded hops followed by the attribute name.
    pub path: Vec<String>,
    /// Full dotted path as written in the criteria.
    pub qualified: String,
}

/// Scalar-valued plan expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(FieldRef),
    Literal(Value),
    Upper(Box<Expr>),
    Trim(Box<Expr>),
    Length(Box<Expr>),
    /// Named function call, aggregate or scalar.
    Function { name: String, args: Vec<Expr> },
    Case {
        when: Box<Predicate>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    /// Boolean value of a predicate.
    Predicate(Box<Predicate>),
}

/// Function names treated as aggregates.
pub const AGGREGATE_FUNCTIONS: &[&str] = &["count", "sum", "avg", "min", "max"];

impl Expr {
    pub fn field(field: FieldRef) -> Self {
        Expr::Field(field)
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn upper(expr: Expr) -> Self {
        Expr::Upper(Box::new(expr))
    }

    pub fn trim(expr: Expr) -> Self {
        Expr::Trim(Box::new(expr))
    }

    pub fn length(expr: Expr) -> Self {
        Expr::Length(Box::new(expr))
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// Check if the expression is an aggregate call or contains one.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Function { name, args } => {
                is_aggregate(name) || args.iter().any(Expr::contains_aggregate)
            }
            Expr::Upper(e) | Expr::Trim(e) | Expr::Length(e) => e.contains_aggregate(),
            Expr::Case {
                then, otherwise, ..
            } => then.contains_aggregate() || otherwise.as_ref().is_some_and(|o| o.contains_aggregate()),
            Expr::Field(_) | Expr::Literal(_) | Expr::Predicate(_) => false,
        }
    }
}

/// Check if a function name denotes an aggregate.
pub fn is_aggregate(name: &str) -> bool {
    AGGREGATE_FUNCTIONS
        .iter()
        .any(|a| a.eq_ignore_ascii_case(name))
}

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Boolean plan expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        op: CompareOp,
        left: Expr,
        right: Expr,
    },
    In {
        expr: Expr,
        values: Vec<Value>,
        negated: bool,
    },
    /// Inclusive range.
    Between { expr: Expr, low: Value, high: Value },
    Like {
        expr: Expr,
        pattern: String,
        escape: char,
    },
    IsNull(Expr),
    IsNotNull(Expr),
    IsEmpty(Expr),
    IsNotEmpty(Expr),
    IsTrue(Expr),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Compare an expression with a value.
    pub fn compare(op: CompareOp, left: Expr, value: Value) -> Self {
        Predicate::Compare {
            op,
            left,
            right: Expr::Literal(value),
        }
    }

    /// Conjunction; a single operand is returned as-is.
    pub fn and(mut parts: Vec<Predicate>) -> Self {
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        }
    }

    /// Disjunction; a single operand is returned as-is.
    pub fn or(mut parts: Vec<Predicate>) -> Self {
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Or(parts)
        }
    }

    pub fn negate(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    fn is_compound(&self) -> bool {
        matches!(self, Predicate::And(parts) | Predicate::Or(parts) if parts.len() > 1)
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub expr: Expr,
    pub direction: Direction,
}

/// One projected element of a tuple query.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub expr: Expr,
    /// Result key; `col_N` is used when absent.
    pub alias: Option<String>,
}

impl Selection {
    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }

    /// Result key of the element at `position`.
    pub fn key(&self, position: usize) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => format!("col_{position}"),
        }
    }
}

/// Render a value as an SQL literal.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => value.to_string(),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(sql_literal).collect();
            format!("({})", rendered.join(", "))
        }
        other => quote(&other.to_string()),
    }
}

fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Field(field) => f.write_str(&field.qualified),
            Expr::Literal(value) => f.write_str(&sql_literal(value)),
            Expr::Upper(e) => write!(f, "UPPER({e})"),
            Expr::Trim(e) => write!(f, "TRIM({e})"),
            Expr::Length(e) => write!(f, "LENGTH({e})"),
            Expr::Function { name, args } => {
                let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", name.to_uppercase(), rendered.join(", "))
            }
            Expr::Case {
                when,
                then,
                otherwise,
            } => {
                write!(f, "CASE WHEN {when} THEN {then}")?;
                if let Some(otherwise) = otherwise {
                    write!(f, " ELSE {otherwise}")?;
                }
                f.write_str(" END")
            }
            Expr::Predicate(p) => write!(f, "({p})"),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Predicate::In {
                expr,
                values,
                negated,
            } => {
                let rendered: Vec<String> = values.iter().map(sql_literal).collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                write!(f, "{expr} {keyword} ({})", rendered.join(", "))
            }
            Predicate::Between { expr, low, high } => write!(
                f,
                "{expr} BETWEEN {} AND {}",
                sql_literal(low),
                sql_literal(high)
            ),
            Predicate::Like {
                expr,
                pattern,
                escape,
            } => {
                write!(f, "{expr} LIKE {}", quote(pattern))?;
                if pattern.contains(*escape) {
                    write!(f, " ESCAPE {}", quote(&escape.to_string()))?;
                }
                Ok(())
            }
            Predicate::IsNull(e) => write!(f, "{e} IS NULL"),
            Predicate::IsNotNull(e) => write!(f, "{e} IS NOT NULL"),
            Predicate::IsEmpty(e) => write!(f, "{e} IS EMPTY"),
            Predicate::IsNotEmpty(e) => write!(f, "{e} IS NOT EMPTY"),
            Predicate::IsTrue(e) => write!(f, "{e} IS TRUE"),
            Predicate::And(parts) => write_joined(f, parts, " AND "),
            Predicate::Or(parts) => write_joined(f, parts, " OR "),
            Predicate::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], sep: &str) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        if part.is_compound() {
            write!(f, "({part})")?;
        } else {
            write!(f, "{part}")?;
        }
    }
    Ok(())
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &str) -> Expr {
        Expr::Field(FieldRef {
            source: Source::Root,
            path: path.split('.').map(String::from).collect(),
            qualified: path.to_string(),
        })
    }

    #[test]
    fn test_render_like() {
        let p = Predicate::negate(Predicate::Like {
            expr: Expr::upper(field("name")),
            pattern: "ACME%".into(),
            escape: '\\',
        });
        assert_eq!(p.to_string(), "NOT (UPPER(name) LIKE 'ACME%')");

        let escaped = Predicate::Like {
            expr: field("code"),
            pattern: "%50\\%%".into(),
            escape: '\\',
        };
        assert_eq!(escaped.to_string(), "code LIKE '%50\\%%' ESCAPE '\\'");
    }

    #[test]
    fn test_render_nested_boolean() {
        let p = Predicate::Or(vec![
            Predicate::compare(CompareOp::Gt, field("amount"), Value::Int(150)),
            Predicate::And(vec![
                Predicate::compare(CompareOp::Eq, field("amount"), Value::Int(150)),
                Predicate::compare(CompareOp::Gt, field("id"), Value::Int(7)),
            ]),
        ]);
        assert_eq!(
            p.to_string(),
            "amount > 150 OR (amount = 150 AND id > 7)"
        );
    }

    #[test]
    fn test_render_literals() {
        assert_eq!(sql_literal(&Value::String("O'Neil".into())), "'O''Neil'");
        assert_eq!(sql_literal(&Value::Null), "NULL");
        assert_eq!(
            sql_literal(&Value::List(vec![Value::Int(1), Value::Int(2)])),
            "(1, 2)"
        );
    }

    #[test]
    fn test_single_operand_collapses() {
        let only = Predicate::IsNull(field("x"));
        assert_eq!(Predicate::and(vec![only.clone()]), only);
        assert_eq!(Predicate::or(vec![only.clone()]), only);
    }

    #[test]
    fn test_aggregate_detection() {
        assert!(Expr::function("SUM", vec![field("amount")]).contains_aggregate());
        assert!(!Expr::function("concat", vec![field("a")]).contains_aggregate());
        assert!(Expr::upper(Expr::function("max", vec![field("name")])).contains_aggregate());
    }

    #[test]
    fn test_selection_key() {
        assert_eq!(Selection::aliased(field("a"), "a").key(3), "a");
        let unaliased = Selection {
            expr: field("a"),
            alias: None,
        };
        assert_eq!(unaliased.key(3), "col_3");
    }
}
