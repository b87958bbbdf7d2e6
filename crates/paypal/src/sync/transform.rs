//! Record flattening and window boundary filtering
//!
//! Raw PayPal items nest related fields under objects such as
//! `transaction_info`. Flattening lifts the children of each declared
//! parent into `<parent>_<child>` fields and merges page-level context
//! (account number, refresh time) into every record.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{EntityDescriptor, Window};
use crate::api::FetchError;
use crate::models::Record;

/// Flatten one raw item according to the entity's denest rules
///
/// Only the declared parents are lifted, one level deep; deeper objects stay
/// structured under the lifted field. Context fields are added unless the
/// item already has a field of the same name.
pub fn flatten(
    raw: Value,
    denest: &[&str],
    context: &Map<String, Value>,
) -> Result<Record, FetchError> {
    let Value::Object(fields) = raw else {
        return Err(FetchError::MalformedResponse(
            "expected each record to be a JSON object".to_string(),
        ));
    };

    let mut record = Record::new();
    for (name, value) in fields {
        match value {
            Value::Object(children) if denest.contains(&name.as_str()) => {
                for (child, child_value) in children {
                    record.insert(format!("{}_{}", name, child), child_value);
                }
            }
            other => record.insert(name, other),
        }
    }

    for (name, value) in context {
        record.insert_if_absent(name, value);
    }
    Ok(record)
}

/// Pick the declared context fields out of a page envelope
pub fn page_context(envelope: &Map<String, Value>, fields: &[&str]) -> Map<String, Value> {
    fields
        .iter()
        .filter_map(|name| {
            envelope
                .get(*name)
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect()
}

/// Transforms the records of one window (or one full-table pass)
///
/// Tracks the running maximum replication value, including records that
/// are suppressed in the overlap before the window start.
pub struct RecordTransformer<'a> {
    entity: &'a EntityDescriptor,
    window: Option<Window>,
    max_replication: Option<DateTime<Utc>>,
    skipped: usize,
}

impl<'a> RecordTransformer<'a> {
    /// Start a pass; `bookmark` seeds the running maximum
    pub fn new(
        entity: &'a EntityDescriptor,
        window: Option<Window>,
        bookmark: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            entity,
            window,
            max_replication: bookmark,
            skipped: 0,
        }
    }

    /// Flatten a raw item and decide whether to emit it
    ///
    /// Returns `Ok(None)` for a record at or before the window's fetch start.
    ///
    /// # Errors
    /// [`FetchError::MalformedResponse`] if the item is not an object or its
    /// replication key is missing or unparseable.
    pub fn transform(
        &mut self,
        raw: Value,
        context: &Map<String, Value>,
    ) -> Result<Option<Record>, FetchError> {
        let record = flatten(raw, self.entity.denest, context)?;

        let Some(key) = self.entity.replication_key() else {
            return Ok(Some(record));
        };
        let ts = record.timestamp(key)?;

        if self.max_replication.is_none_or(|max| ts > max) {
            self.max_replication = Some(ts);
        }

        if let Some(window) = &self.window
            && !window.admits(ts)
        {
            self.skipped += 1;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Largest replication value seen so far
    pub fn max_replication_value(&self) -> Option<DateTime<Utc>> {
        self.max_replication
    }

    /// Records suppressed in the overlap before the window start
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
