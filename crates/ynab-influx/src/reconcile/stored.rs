use crate::point::{FieldValue, Point};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A transaction point read back from the store.
///
/// Queries do not tell tags from fields, so every non-null column except `time` lands in `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransaction {
    pub id: String,
    pub time: Option<DateTime<Utc>>,
    pub values: BTreeMap<String, FieldValue>,
}

impl StoredTransaction {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let mut values = BTreeMap::new();
        values.insert("id".to_owned(), FieldValue::String(id.clone()));
        StoredTransaction {
            id,
            time: None,
            values,
        }
    }

    /// Whether writing `point` would reproduce this record exactly.
    pub fn matches(&self, point: &Point) -> bool {
        if self.time != Some(point.time) {
            return false;
        }
        self.values == column_values(point)
    }
}

impl From<&Point> for StoredTransaction {
    fn from(point: &Point) -> Self {
        StoredTransaction {
            id: point.tag_value("id").unwrap_or_default().to_owned(),
            time: Some(point.time),
            values: column_values(point),
        }
    }
}

// Values as a query returns them. The store keeps newline escapes as written, and
// backslash escapes too in tags.
fn column_values(point: &Point) -> BTreeMap<String, FieldValue> {
    let tags = point.tags.iter().map(|(key, value)| {
        let value = value.replace('\\', "\\\\").replace('\n', "\\n");
        (key.clone(), FieldValue::String(value))
    });
    let fields = point.fields.iter().map(|(key, value)| {
        let value = match value {
            FieldValue::String(text) => FieldValue::String(text.replace('\n', "\\n")),
            other => other.clone(),
        };
        (key.clone(), value)
    });
    tags.chain(fields).collect()
}
