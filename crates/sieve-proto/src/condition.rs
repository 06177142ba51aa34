//! Filter conditions of a search document.
//!
//! A [`Condition`] pairs a [`Comparator`] with an ordered list of
//! [`Operand`]s. Documents are loosely typed JSON: an operand may be a literal,
//! a nested condition, or a map of field paths to operands. The shape is
//! decided once here, when the document is read, so the compiler only ever
//! matches on the tagged union.

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::Error;

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Comparator {
    #[default]
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Substring match (`CONTAINS` is an alias).
    Like,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    /// Negated, prefix-anchored match (`NOT_CONTAINS` is an alias).
    NotLike,
    Between,
    IsNull,
    IsNotNull,
    /// To-many relationship has no elements.
    IsEmpty,
    IsNotEmpty,
    Or,
    And,
    Case,
    /// Marks the otherwise-branch of a `CASE`. Compares like `EQ`.
    Else,
}

impl Comparator {
    /// Parse a comparator keyword.
    ///
    /// Matching ignores case, underscores and spaces, and accepts the usual
    /// symbolic spellings. Anything unrecognized is `EQ`.
    pub fn parse(keyword: &str) -> Self {
        let key: String = keyword
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != ' ')
            .flat_map(char::to_uppercase)
            .collect();

        match key.as_str() {
            "NE" | "NEQ" | "NOTEQUAL" | "NOTEQUALS" | "!=" | "<>" => Comparator::Ne,
            "GT" | ">" => Comparator::Gt,
            "GE" | "GTE" | ">=" => Comparator::Ge,
            "LT" | "<" => Comparator::Lt,
            "LE" | "LTE" | "<=" => Comparator::Le,
            "LIKE" | "CONTAINS" => Comparator::Like,
            "STARTSWITH" => Comparator::StartsWith,
            "ENDSWITH" => Comparator::EndsWith,
            "IN" => Comparator::In,
            "NOTIN" => Comparator::NotIn,
            "NOTLIKE" | "NOTCONTAINS" => Comparator::NotLike,
            "BETWEEN" => Comparator::Between,
            "ISNULL" => Comparator::IsNull,
            "ISNOTNULL" => Comparator::IsNotNull,
            "ISEMPTY" => Comparator::IsEmpty,
            "ISNOTEMPTY" => Comparator::IsNotEmpty,
            "OR" => Comparator::Or,
            "AND" => Comparator::And,
            "CASE" => Comparator::Case,
            "ELSE" => Comparator::Else,
            _ => Comparator::Eq,
        }
    }

    /// Canonical keyword.
    pub fn name(&self) -> &'static str {
        match self {
            Comparator::Eq => "EQ",
            Comparator::Ne => "NE",
            Comparator::Gt => "GT",
            Comparator::Ge => "GE",
            Comparator::Lt => "LT",
            Comparator::Le => "LE",
            Comparator::Like => "LIKE",
            Comparator::StartsWith => "STARTS_WITH",
            Comparator::EndsWith => "ENDS_WITH",
            Comparator::In => "IN",
            Comparator::NotIn => "NOT_IN",
            Comparator::NotLike => "NOT_LIKE",
            Comparator::Between => "BETWEEN",
            Comparator::IsNull => "IS_NULL",
            Comparator::IsNotNull => "IS_NOT_NULL",
            Comparator::IsEmpty => "IS_EMPTY",
            Comparator::IsNotEmpty => "IS_NOT_EMPTY",
            Comparator::Or => "OR",
            Comparator::And => "AND",
            Comparator::Case => "CASE",
            Comparator::Else => "ELSE",
        }
    }

    /// `AND`, `OR` and `CASE` combine other conditions.
    pub fn is_composite(&self) -> bool {
        matches!(self, Comparator::And | Comparator::Or | Comparator::Case)
    }

    /// Comparators compiled to a `LIKE` pattern.
    pub fn is_like_family(&self) -> bool {
        matches!(
            self,
            Comparator::Like | Comparator::StartsWith | Comparator::EndsWith | Comparator::NotLike
        )
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Comparator {
    fn from(keyword: &str) -> Self {
        Comparator::parse(keyword)
    }
}

/// One element of a condition's value list.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A JSON scalar or array, coerced later against the target attribute.
    Literal(serde_json::Value),
    /// A nested condition applying to the enclosing field.
    Condition(Condition),
    /// Field path to operand, each entry applying to its own field.
    Fields(IndexMap<String, Operand>),
}

impl Operand {
    /// Classify a raw JSON value.
    ///
    /// Objects carrying condition keys become conditions, other objects become
    /// field maps. Strings holding a JSON object are parsed first.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, Error> {
        match raw {
            serde_json::Value::Object(map) => {
                if is_condition_object(&map) {
                    Ok(Operand::Condition(Condition::from_object(map)?))
                } else {
                    let mut fields = IndexMap::with_capacity(map.len());
                    for (field, value) in map {
                        fields.insert(field, Operand::from_json(value)?);
                    }
                    Ok(Operand::Fields(fields))
                }
            }
            serde_json::Value::String(s) if looks_like_object(&s) => {
                match serde_json::from_str::<serde_json::Value>(&s) {
                    Ok(parsed @ serde_json::Value::Object(_)) => Operand::from_json(parsed),
                    _ => Ok(Operand::Literal(serde_json::Value::String(s))),
                }
            }
            other => Ok(Operand::Literal(other)),
        }
    }

    /// The literal, if this operand is one.
    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Operand::Literal(v) => Some(v),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Operand {
    fn from(v: serde_json::Value) -> Self {
        Operand::Literal(v)
    }
}

impl From<Condition> for Operand {
    fn from(c: Condition) -> Self {
        Operand::Condition(c)
    }
}

impl From<IndexMap<String, Operand>> for Operand {
    fn from(fields: IndexMap<String, Operand>) -> Self {
        Operand::Fields(fields)
    }
}

/// A filter condition: comparator, values and string normalization flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct Condition {
    pub comparator: Comparator,
    pub values: Vec<Operand>,
    /// Trim string values and columns before comparing.
    pub trim: bool,
    /// Upper-case string values and columns before comparing.
    pub upper: bool,
}

impl Condition {
    /// Create a condition with default normalization (trim and upper-case).
    pub fn new(comparator: Comparator, values: Vec<Operand>) -> Self {
        Self {
            comparator,
            values,
            trim: true,
            upper: true,
        }
    }

    fn single(comparator: Comparator, value: impl Into<serde_json::Value>) -> Self {
        Self::new(comparator, vec![Operand::Literal(value.into())])
    }

    fn many<I, V>(comparator: Comparator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self::new(
            comparator,
            values
                .into_iter()
                .map(|v| Operand::Literal(v.into()))
                .collect(),
        )
    }

    pub fn eq(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::Eq, value)
    }

    pub fn ne(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::Ne, value)
    }

    pub fn gt(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::Gt, value)
    }

    pub fn ge(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::Ge, value)
    }

    pub fn lt(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::Lt, value)
    }

    pub fn le(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::Le, value)
    }

    pub fn like(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::Like, value)
    }

    pub fn starts_with(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::StartsWith, value)
    }

    pub fn ends_with(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::EndsWith, value)
    }

    pub fn not_like(value: impl Into<serde_json::Value>) -> Self {
        Self::single(Comparator::NotLike, value)
    }

    pub fn in_list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self::many(Comparator::In, values)
    }

    pub fn not_in<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self::many(Comparator::NotIn, values)
    }

    /// Inclusive range.
    pub fn between(low: impl Into<serde_json::Value>, high: impl Into<serde_json::Value>) -> Self {
        Self::new(
            Comparator::Between,
            vec![Operand::Literal(low.into()), Operand::Literal(high.into())],
        )
    }

    pub fn is_null() -> Self {
        Self::new(Comparator::IsNull, Vec::new())
    }

    pub fn is_not_null() -> Self {
        Self::new(Comparator::IsNotNull, Vec::new())
    }

    pub fn is_empty() -> Self {
        Self::new(Comparator::IsEmpty, Vec::new())
    }

    pub fn is_not_empty() -> Self {
        Self::new(Comparator::IsNotEmpty, Vec::new())
    }

    pub fn or(operands: impl IntoIterator<Item = Operand>) -> Self {
        Self::new(Comparator::Or, operands.into_iter().collect())
    }

    pub fn and(operands: impl IntoIterator<Item = Operand>) -> Self {
        Self::new(Comparator::And, operands.into_iter().collect())
    }

    /// `CASE WHEN <branches> THEN <result>`.
    pub fn case(result: Operand, branches: impl IntoIterator<Item = Operand>) -> Self {
        let mut values = vec![result];
        values.extend(branches);
        Self::new(Comparator::Case, values)
    }

    /// Set whether string values and columns are trimmed.
    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    /// Set whether string values and columns are upper-cased.
    pub fn with_upper(mut self, upper: bool) -> Self {
        self.upper = upper;
        self
    }

    /// Check the value count against the comparator.
    pub fn validate(&self) -> Result<(), Error> {
        let actual = self.values.len();
        let (valid, expected) = match self.comparator {
            Comparator::Between => (actual == 2, "exactly 2"),
            Comparator::IsNull
            | Comparator::IsNotNull
            | Comparator::IsEmpty
            | Comparator::IsNotEmpty => (actual == 0, "no"),
            Comparator::Case => (actual >= 2, "at least 2"),
            _ => (actual >= 1, "at least 1"),
        };

        if valid {
            Ok(())
        } else {
            Err(Error::InvalidConditionArity {
                comparator: self.comparator,
                expected,
                actual,
            })
        }
    }

    /// Read a condition from raw JSON.
    ///
    /// A condition object is read as such. An array is shorthand for `IN`, any
    /// other value for `EQ` against that value.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, Error> {
        match raw {
            serde_json::Value::Array(items) => Ok(Self::new(
                Comparator::In,
                items
                    .into_iter()
                    .map(Operand::from_json)
                    .collect::<Result<_, _>>()?,
            )),
            other => match Operand::from_json(other)? {
                Operand::Condition(condition) => Ok(condition),
                operand => Ok(Self::new(Comparator::Eq, vec![operand])),
            },
        }
    }

    fn from_object(mut map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Error> {
        let comparator = match map.remove("comparador").or_else(|| map.remove("comparator")) {
            None | Some(serde_json::Value::Null) => Comparator::Eq,
            Some(serde_json::Value::String(keyword)) => Comparator::parse(&keyword),
            Some(other) => {
                return Err(Error::InvalidCondition(format!(
                    "comparator must be a string, got {other}"
                )))
            }
        };

        let values = match map.remove("values") {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .map(Operand::from_json)
                .collect::<Result<_, _>>()?,
            Some(single) => vec![Operand::from_json(single)?],
        };

        Ok(Self {
            comparator,
            values,
            trim: read_flag(&map, "trim")?,
            upper: read_flag(&map, "upper")?,
        })
    }
}

impl TryFrom<serde_json::Value> for Condition {
    type Error = Error;

    fn try_from(raw: serde_json::Value) -> Result<Self, Self::Error> {
        Condition::from_json(raw)
    }
}

fn is_condition_object(map: &serde_json::Map<String, serde_json::Value>) -> bool {
    map.contains_key("comparador") || map.contains_key("comparator") || map.contains_key("values")
}

fn looks_like_object(s: &str) -> bool {
    let s = s.trim();
    s.starts_with('{') && s.ends_with('}')
}

fn read_flag(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<bool, Error> {
    match map.get(key) {
        None | Some(serde_json::Value::Null) => Ok(true),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(other) => Err(Error::InvalidCondition(format!(
            "{key} must be a boolean, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comparator_aliases() {
        assert_eq!(Comparator::parse("notlike"), Comparator::NotLike);
        assert_eq!(Comparator::parse("NOT_CONTAINS"), Comparator::NotLike);
        assert_eq!(Comparator::parse("contains"), Comparator::Like);
        assert_eq!(Comparator::parse(">="), Comparator::Ge);
        assert_eq!(Comparator::parse("lte"), Comparator::Le);
        assert_eq!(Comparator::parse("starts_with"), Comparator::StartsWith);
        assert_eq!(Comparator::parse("IsNotNull"), Comparator::IsNotNull);
        assert_eq!(Comparator::parse("whatever"), Comparator::Eq);
        assert_eq!(Comparator::parse(""), Comparator::Eq);
    }

    #[test]
    fn test_parse_condition_object() {
        let cond: Condition =
            serde_json::from_value(json!({"comparador": "BETWEEN", "values": [100, 200]}))
                .unwrap();

        assert_eq!(cond.comparator, Comparator::Between);
        assert_eq!(cond.values.len(), 2);
        assert!(cond.trim);
        assert!(cond.upper);
        assert_eq!(cond, Condition::between(100, 200));
    }

    #[test]
    fn test_parse_english_key_and_flags() {
        let cond = Condition::from_json(json!({
            "comparator": "like",
            "values": ["x"],
            "trim": false,
            "upper": false
        }))
        .unwrap();

        assert_eq!(cond.comparator, Comparator::Like);
        assert!(!cond.trim);
        assert!(!cond.upper);
    }

    #[test]
    fn test_shorthand_values() {
        assert_eq!(Condition::from_json(json!("ACME")).unwrap(), Condition::eq("ACME"));
        assert_eq!(
            Condition::from_json(json!(["A", "B"])).unwrap(),
            Condition::in_list(["A", "B"])
        );
    }

    #[test]
    fn test_nested_operands() {
        let cond = Condition::from_json(json!({
            "comparador": "OR",
            "values": [
                {"comparador": "GT", "values": [10]},
                {"status": "OPEN", "priority": {"comparador": "IN", "values": [1, 2]}},
                "{\"comparador\": \"LT\", \"values\": [0]}",
                5
            ]
        }))
        .unwrap();

        assert_eq!(cond.comparator, Comparator::Or);
        assert_eq!(cond.values[0], Operand::Condition(Condition::gt(10)));

        match &cond.values[1] {
            Operand::Fields(fields) => {
                let keys: Vec<_> = fields.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["status", "priority"]);
                assert_eq!(fields["status"], Operand::Literal(json!("OPEN")));
                assert_eq!(
                    fields["priority"],
                    Operand::Condition(Condition::in_list([1, 2]))
                );
            }
            other => panic!("expected field map, got {other:?}"),
        }

        assert_eq!(cond.values[2], Operand::Condition(Condition::lt(0)));
        assert_eq!(cond.values[3], Operand::Literal(json!(5)));
    }

    #[test]
    fn test_malformed_json_string_stays_literal() {
        let op = Operand::from_json(json!("{not json}")).unwrap();
        assert_eq!(op, Operand::Literal(json!("{not json}")));
    }

    #[test]
    fn test_bad_flag_type() {
        let err = Condition::from_json(json!({"comparador": "EQ", "values": [1], "trim": "no"}));
        assert!(matches!(err, Err(Error::InvalidCondition(_))));
    }

    #[test]
    fn test_validate_arity() {
        assert!(Condition::between(1, 2).validate().is_ok());
        assert!(matches!(
            Condition::new(Comparator::Between, vec![json!(1).into()]).validate(),
            Err(Error::InvalidConditionArity { actual: 1, .. })
        ));
        assert!(Condition::new(Comparator::Between, vec![json!(1).into(); 3])
            .validate()
            .is_err());

        assert!(Condition::new(Comparator::In, vec![]).validate().is_err());
        assert!(Condition::new(Comparator::NotIn, vec![]).validate().is_err());
        assert!(Condition::in_list([1]).validate().is_ok());

        assert!(Condition::is_null().validate().is_ok());
        assert!(Condition::new(Comparator::IsNull, vec![json!(1).into()])
            .validate()
            .is_err());
        assert!(Condition::new(Comparator::IsNotNull, vec![json!(1).into()])
            .validate()
            .is_err());

        assert!(Condition::new(Comparator::Eq, vec![]).validate().is_err());
    }

    #[test]
    fn test_arity_error_message() {
        let err = Condition::new(Comparator::Between, vec![]).validate().unwrap_err();
        assert_eq!(err.to_string(), "BETWEEN expects exactly 2 value(s), got 0");
    }
}
