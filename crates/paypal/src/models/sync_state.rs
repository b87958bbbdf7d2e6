//! Persisted sync progress
//!
//! Serialized as `{"bookmarks": {<entity>: <ISO-8601>}, "currently_syncing": <entity>}`
//! with `currently_syncing` omitted when no entity is mid-sync.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp::{format_timestamp, parse_timestamp};

/// Bookmarks plus the in-flight entity marker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Last synced replication value per entity
    #[serde(default)]
    pub bookmarks: BTreeMap<String, String>,
    /// Entity whose sync started but has not completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currently_syncing: Option<String>,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bookmark string for an entity
    pub fn bookmark(&self, entity: &str) -> Option<&str> {
        self.bookmarks.get(entity).map(String::as_str)
    }

    /// Parsed bookmark for an entity; `None` if absent or unparseable
    pub fn bookmark_time(&self, entity: &str) -> Option<DateTime<Utc>> {
        self.bookmark(entity).and_then(parse_timestamp)
    }

    pub fn set_bookmark(&mut self, entity: &str, value: DateTime<Utc>) {
        self.bookmarks
            .insert(entity.to_string(), format_timestamp(value));
    }

    pub fn set_currently_syncing(&mut self, entity: Option<&str>) {
        self.currently_syncing = entity.map(str::to_string);
    }

    /// True when a previous run stopped mid-entity
    pub fn was_interrupted(&self) -> bool {
        self.currently_syncing.is_some()
    }
}
