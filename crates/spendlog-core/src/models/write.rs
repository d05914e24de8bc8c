use serde::{Deserialize, Serialize};

use super::{Record, RecordId};

/// Input for an insert. Only the named fields are read; anything else in the
/// source object is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecord {
    pub account: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: i64,
    pub description: String,
    pub available_credit: f64,
    #[serde(default)]
    pub category: Option<String>,
}

impl NewRecord {
    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            account: self.account,
            amount: self.amount,
            currency: self.currency,
            timestamp: self.timestamp,
            description: self.description,
            available_credit: self.available_credit,
            category: self.category,
        }
    }
}

/// Fields an edit may touch. Absent fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.timestamp.is_none() && self.category.is_none()
    }

    pub fn apply_to(&self, record: &mut Record) {
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
        if let Some(timestamp) = self.timestamp {
            record.timestamp = timestamp;
        }
        if let Some(category) = &self.category {
            record.category = Some(category.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_ignores_unknown_fields() {
        let input = serde_json::json!({
            "account": "acc-1",
            "amount": 20.0,
            "currency": "USD",
            "timestamp": 150,
            "description": "coffee",
            "availableCredit": 480.0,
            "merchantCode": 5814,
            "_id": "should-not-be-read"
        });
        let record: NewRecord = serde_json::from_value(input).unwrap();
        assert_eq!(record.account, "acc-1");
        assert_eq!(record.timestamp, 150);
        assert_eq!(record.available_credit, 480.0);
        assert_eq!(record.category, None);
    }

    #[test]
    fn test_new_record_requires_timestamp() {
        let input = serde_json::json!({
            "account": "acc-1",
            "amount": 20.0,
            "currency": "USD",
            "description": "coffee",
            "availableCredit": 480.0
        });
        assert!(serde_json::from_value::<NewRecord>(input).is_err());
    }

    #[test]
    fn test_changes_only_touch_editable_fields() {
        let mut record = NewRecord {
            account: "acc-1".to_string(),
            amount: 20.0,
            currency: "USD".to_string(),
            timestamp: 150,
            description: "coffee".to_string(),
            available_credit: 480.0,
            category: None,
        }
        .into_record(RecordId::from("r1"));

        let changes: RecordChanges = serde_json::from_value(serde_json::json!({
            "description": "espresso",
            "category": "food",
            "amount": 999.0
        }))
        .unwrap();
        changes.apply_to(&mut record);

        assert_eq!(record.description, "espresso");
        assert_eq!(record.category.as_deref(), Some("food"));
        assert_eq!(record.timestamp, 150);
        assert_eq!(record.amount, 20.0);
    }

    #[test]
    fn test_empty_changes() {
        assert!(RecordChanges::default().is_empty());
        let changes = RecordChanges {
            timestamp: Some(5),
            ..Default::default()
        };
        assert!(!changes.is_empty());
    }
}
