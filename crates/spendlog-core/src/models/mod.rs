use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub mod write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Expense,
    Income,
}

impl RecordKind {
    /// Name of the collection holding records of this kind.
    pub fn collection_name(&self) -> &'static str {
        match self {
            RecordKind::Expense => "expenses",
            RecordKind::Income => "incomes",
        }
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Expense => f.write_str("expense"),
            RecordKind::Income => f.write_str("income"),
        }
    }
}

/// Opaque record key assigned by the driver on insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A stored expense or income entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    pub account: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: i64,
    pub description: String,
    pub available_credit: f64,
    #[serde(default)]
    pub category: Option<String>,
}

impl Record {
    pub fn public_view(&self) -> PublicRecord {
        PublicRecord::from(self)
    }
}

/// Outward view of a record. Identifier, amount and category are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRecord {
    pub account: String,
    pub currency: String,
    pub timestamp: i64,
    pub description: String,
    pub available_credit: f64,
}

impl From<&Record> for PublicRecord {
    fn from(record: &Record) -> Self {
        Self {
            account: record.account.clone(),
            currency: record.currency.clone(),
            timestamp: record.timestamp,
            description: record.description.clone(),
            available_credit: record.available_credit,
        }
    }
}

/// Half-open window `[start, end)` over record timestamps, in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            id: RecordId::from("r1"),
            account: "acc-1".to_string(),
            amount: 12.5,
            currency: "EUR".to_string(),
            timestamp: 1_700_000_000,
            description: "groceries".to_string(),
            available_credit: 900.0,
            category: Some("food".to_string()),
        }
    }

    #[test]
    fn test_time_range_is_half_open() {
        let range = TimeRange::new(100, 200);
        assert!(!range.contains(99));
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
    }

    #[test]
    fn test_empty_time_range_contains_nothing() {
        let range = TimeRange::new(100, 100);
        assert!(!range.contains(100));
    }

    #[test]
    fn test_public_view_strips_private_fields() {
        let record = sample();
        let view = record.public_view();
        assert_eq!(view.account, "acc-1");
        assert_eq!(view.currency, "EUR");
        assert_eq!(view.timestamp, 1_700_000_000);
        assert_eq!(view.description, "groceries");
        assert_eq!(view.available_credit, 900.0);

        let json = serde_json::to_value(&view).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        assert!(obj.contains_key("availableCredit"));
        assert!(!obj.contains_key("amount"));
        assert!(!obj.contains_key("category"));
        assert!(!obj.contains_key("id"));
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(RecordKind::Expense.collection_name(), "expenses");
        assert_eq!(RecordKind::Income.collection_name(), "incomes");
    }
}
