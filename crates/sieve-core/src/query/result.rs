//! Executed query results.

use serde::Serialize;
use sieve_proto::Object;

/// Rows produced by executing a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum ResultSet {
    /// Root entity records.
    Entities(Vec<Object>),
    /// Alias to value maps, in projection order.
    Rows(Vec<Object>),
    Count(u64),
}

impl ResultSet {
    /// Number of rows; the count itself for a count result.
    pub fn len(&self) -> usize {
        match self {
            ResultSet::Entities(records) | ResultSet::Rows(records) => records.len(),
            ResultSet::Count(n) => *n as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records or rows; empty for a count.
    pub fn records(&self) -> &[Object] {
        match self {
            ResultSet::Entities(records) | ResultSet::Rows(records) => records,
            ResultSet::Count(_) => &[],
        }
    }

    pub fn into_records(self) -> Vec<Object> {
        match self {
            ResultSet::Entities(records) | ResultSet::Rows(records) => records,
            ResultSet::Count(_) => Vec::new(),
        }
    }

    /// Keep the first record only.
    pub fn truncate_to_first(&mut self) {
        if let ResultSet::Entities(records) | ResultSet::Rows(records) = self {
            records.truncate(1);
        }
    }
}
