//! The search criteria document.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::Error;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String")]
pub enum Direction {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl Direction {
    /// `ASC` in any case is ascending; any other text is descending.
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("ASC") {
            Direction::Asc
        } else {
            Direction::Desc
        }
    }

    pub fn is_asc(&self) -> bool {
        matches!(self, Direction::Asc)
    }
}

impl From<String> for Direction {
    fn from(text: String) -> Self {
        Direction::parse(&text)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

/// Field reference(s) of a projected function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FunctionSpec {
    /// One field path.
    Field(String),
    /// Several arguments, each a field path or a literal.
    Fields(Vec<String>),
}

impl FunctionSpec {
    /// All raw references, in order.
    pub fn references(&self) -> Vec<&str> {
        match self {
            FunctionSpec::Field(f) => vec![f.as_str()],
            FunctionSpec::Fields(fs) => fs.iter().map(String::as_str).collect(),
        }
    }

    /// The reference when there is exactly one written as a plain string.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            FunctionSpec::Field(f) => Some(f),
            FunctionSpec::Fields(_) => None,
        }
    }
}

impl From<&str> for FunctionSpec {
    fn from(field: &str) -> Self {
        FunctionSpec::Field(field.to_string())
    }
}

impl From<Vec<&str>> for FunctionSpec {
    fn from(fields: Vec<&str>) -> Self {
        FunctionSpec::Fields(fields.into_iter().map(String::from).collect())
    }
}

/// Validated keyset pagination parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SeekSpec {
    pub field: String,
    pub direction: Direction,
    pub value: serde_json::Value,
    pub id_value: Option<serde_json::Value>,
}

/// A declarative search over one root entity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    /// Root entity name.
    pub entity: String,
    /// Field path to condition, in document order.
    #[serde(default)]
    pub filters: IndexMap<String, Condition>,
    /// `path[:length|trim]` to direction, in document order.
    #[serde(default)]
    pub orders: IndexMap<String, Direction>,
    #[serde(default, alias = "groupsBy")]
    pub group_by: Vec<String>,
    /// Projection alias to function argument(s).
    #[serde(default)]
    pub functions: IndexMap<String, FunctionSpec>,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Offset of the first row.
    #[serde(default)]
    pub first: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default = "default_distinct")]
    pub distinct: bool,
    #[serde(default)]
    pub single_result: bool,
    /// Map entity results through the registered mapper.
    #[serde(default)]
    pub resolve_dto: bool,
    #[serde(default)]
    pub seek: bool,
    #[serde(default)]
    pub cursor_field: Option<String>,
    #[serde(default)]
    pub cursor_direction: Option<Direction>,
    #[serde(default)]
    pub cursor_value: Option<serde_json::Value>,
    #[serde(default)]
    pub cursor_id_value: Option<serde_json::Value>,
}

fn default_distinct() -> bool {
    true
}

impl SearchCriteria {
    /// Create an empty search over an entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filters: IndexMap::new(),
            orders: IndexMap::new(),
            group_by: Vec::new(),
            functions: IndexMap::new(),
            columns: Vec::new(),
            first: None,
            page_size: None,
            distinct: true,
            single_result: false,
            resolve_dto: false,
            seek: false,
            cursor_field: None,
            cursor_direction: None,
            cursor_value: None,
            cursor_id_value: None,
        }
    }

    /// Read a criteria document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(text)?)
    }

    /// Add a filter on a field path.
    pub fn with_filter(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.filters.insert(field.into(), condition);
        self
    }

    /// Add an order term.
    pub fn with_order(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.orders.insert(field.into(), direction);
        self
    }

    pub fn with_group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    /// Add a projected function (or plain column when alias equals the field).
    pub fn with_function(mut self, alias: impl Into<String>, spec: impl Into<FunctionSpec>) -> Self {
        self.functions.insert(alias.into(), spec.into());
        self
    }

    pub fn with_column(mut self, field: impl Into<String>) -> Self {
        self.columns.push(field.into());
        self
    }

    pub fn with_first(mut self, first: u32) -> Self {
        self.first = Some(first);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Ask for the first row only.
    pub fn single(mut self) -> Self {
        self.single_result = true;
        self
    }

    pub fn with_resolve_dto(mut self) -> Self {
        self.resolve_dto = true;
        self
    }

    /// Enable keyset pagination after the given cursor value.
    pub fn with_seek(
        mut self,
        field: impl Into<String>,
        direction: Direction,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.seek = true;
        self.cursor_field = Some(field.into());
        self.cursor_direction = Some(direction);
        self.cursor_value = Some(value.into());
        self
    }

    /// Set the identifier tie-breaker of the seek cursor.
    pub fn with_cursor_id(mut self, id: impl Into<serde_json::Value>) -> Self {
        self.cursor_id_value = Some(id.into());
        self
    }

    /// Whether the result rows are tuples instead of entities.
    pub fn is_tuple_query(&self) -> bool {
        !self.functions.is_empty() || !self.columns.is_empty()
    }

    /// The seek parameters, when seek pagination is requested.
    pub fn seek_spec(&self) -> Result<Option<SeekSpec>, Error> {
        if !self.seek {
            return Ok(None);
        }

        let field = self
            .cursor_field
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or(Error::IncompleteSeekSpecification("cursorField"))?;
        let direction = self
            .cursor_direction
            .ok_or(Error::IncompleteSeekSpecification("cursorDirection"))?;
        let value = self
            .cursor_value
            .clone()
            .ok_or(Error::IncompleteSeekSpecification("cursorValue"))?;

        Ok(Some(SeekSpec {
            field: field.to_string(),
            direction,
            value,
            id_value: self.cursor_id_value.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Comparator;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_document() {
        let criteria = SearchCriteria::from_json(
            r#"{
                "entity": "Invoice",
                "filters": {
                    "amount": {"comparador": "BETWEEN", "values": [100, 200]},
                    "customer.name": "acme"
                },
                "orders": {"issuedAt": "DESC", "number": "asc"},
                "groupsBy": ["customer.name"],
                "functions": {"sum": "amount", "concat": ["number", "-"]},
                "pageSize": 10,
                "singleResult": true
            }"#,
        )
        .unwrap();

        assert_eq!(criteria.entity, "Invoice");
        let fields: Vec<_> = criteria.filters.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["amount", "customer.name"]);
        assert_eq!(criteria.filters["amount"].comparator, Comparator::Between);
        assert_eq!(criteria.filters["customer.name"], Condition::eq("acme"));
        assert_eq!(criteria.orders["issuedAt"], Direction::Desc);
        assert_eq!(criteria.orders["number"], Direction::Asc);
        assert_eq!(criteria.group_by, vec!["customer.name".to_string()]);
        assert_eq!(criteria.functions["sum"], FunctionSpec::from("amount"));
        assert_eq!(
            criteria.functions["concat"].references(),
            vec!["number", "-"]
        );
        assert_eq!(criteria.page_size, Some(10));
        assert_eq!(criteria.first, None);
        assert!(criteria.distinct);
        assert!(criteria.single_result);
        assert!(criteria.is_tuple_query());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("asc"), Direction::Asc);
        assert_eq!(Direction::parse(" ASC "), Direction::Asc);
        assert_eq!(Direction::parse("DESC"), Direction::Desc);
        assert_eq!(Direction::parse("down"), Direction::Desc);
    }

    #[test]
    fn test_builder() {
        let criteria = SearchCriteria::new("Invoice")
            .with_filter("amount", Condition::between(100, 200))
            .with_order("issuedAt", Direction::Desc)
            .with_page_size(10);

        assert_eq!(criteria.filters.len(), 1);
        assert_eq!(criteria.page_size, Some(10));
        assert!(!criteria.is_tuple_query());
        assert!(criteria.seek_spec().unwrap().is_none());
    }

    #[test]
    fn test_seek_spec_complete() {
        let criteria = SearchCriteria::new("Invoice")
            .with_seek("amount", Direction::Asc, 150)
            .with_cursor_id(7);

        let seek = criteria.seek_spec().unwrap().unwrap();
        assert_eq!(seek.field, "amount");
        assert_eq!(seek.direction, Direction::Asc);
        assert_eq!(seek.value, serde_json::json!(150));
        assert_eq!(seek.id_value, Some(serde_json::json!(7)));
    }

    #[test]
    fn test_seek_spec_incomplete() {
        let mut criteria = SearchCriteria::new("Invoice").with_seek("amount", Direction::Asc, 1);
        criteria.cursor_value = None;
        assert!(matches!(
            criteria.seek_spec(),
            Err(Error::IncompleteSeekSpecification("cursorValue"))
        ));

        criteria.cursor_field = None;
        assert!(matches!(
            criteria.seek_spec(),
            Err(Error::IncompleteSeekSpecification("cursorField"))
        ));
    }

    #[test]
    fn test_bad_condition_is_a_document_error() {
        let err = SearchCriteria::from_json(
            r#"{"entity": "Invoice", "filters": {"amount": {"comparador": 5}}}"#,
        );
        assert!(matches!(err, Err(Error::Deserialization(_))));
    }
}
