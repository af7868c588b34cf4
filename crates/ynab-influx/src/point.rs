//! Time-series points and their InfluxDB line protocol encoding.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// A single record of a measurement. Tags are indexed strings, fields hold the values.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub time: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>) -> Self {
        Point {
            measurement: measurement.into(),
            time,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Empty tag values are dropped, the store cannot index them.
    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.tags.insert(key.to_owned(), value);
        }
        self
    }

    pub fn tag_opt(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.tag(key, value),
            None => self,
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    pub fn field_opt(self, key: &str, value: Option<impl Into<FieldValue>>) -> Self {
        match value {
            Some(value) => self.field(key, value),
            None => self,
        }
    }

    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Encode as one line of line protocol with a timestamp in seconds.
    ///
    /// Returns `None` for a point without fields, which the store would reject.
    pub fn to_line(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }

        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
        }

        let mut separator = ' ';
        for (key, value) in &self.fields {
            line.push(separator);
            separator = ',';
            line.push_str(&escape_key(key));
            line.push('=');
            match value {
                FieldValue::Integer(value) => {
                    let _ = write!(line, "{value}i");
                }
                FieldValue::Float(value) => {
                    let _ = write!(line, "{value}");
                }
                FieldValue::Boolean(value) => {
                    let _ = write!(line, "{value}");
                }
                FieldValue::String(value) => {
                    line.push('"');
                    line.push_str(&escape(value, &['"']));
                    line.push('"');
                }
            }
        }

        let _ = write!(line, " {}", self.time.timestamp());
        Some(line)
    }
}

fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            c if special.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
