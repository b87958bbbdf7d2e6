//! Flattened record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::FetchError;
use crate::timestamp::parse_timestamp;

/// One extracted row: field name to value, after flattening
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Insert a field, replacing any previous value
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Insert a field only if it is not already present
    pub fn insert_if_absent(&mut self, field: &str, value: &Value) {
        if !self.fields.contains_key(field) {
            self.fields.insert(field.to_string(), value.clone());
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Parse `field` as an absolute timestamp
    ///
    /// # Errors
    /// Returns [`FetchError::MalformedResponse`] if the field is missing,
    /// not a string, or not a recognizable timestamp.
    pub fn timestamp(&self, field: &str) -> Result<DateTime<Utc>, FetchError> {
        let raw = self.get_str(field).ok_or_else(|| {
            FetchError::MalformedResponse(format!("record is missing timestamp field '{}'", field))
        })?;
        parse_timestamp(raw).ok_or_else(|| {
            FetchError::MalformedResponse(format!("unparseable timestamp in '{}': {}", field, raw))
        })
    }
}
