//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::SyncState;

/// Trait for persisting sync progress
///
/// Every mutation is durable before it returns. Bookmarks are expected to
/// be monotonically non-decreasing per entity; that is the caller's
/// obligation and is not checked here.
pub trait BookmarkStore: Send + Sync {
    /// Bookmark for `entity`, or `default` if none is stored
    fn get_bookmark(&self, entity: &str, default: DateTime<Utc>) -> Result<DateTime<Utc>>;

    /// Store a new bookmark for `entity` and persist immediately
    fn set_bookmark(&self, entity: &str, value: DateTime<Utc>) -> Result<()>;

    /// Set or clear the in-flight entity marker and persist immediately
    fn mark_syncing(&self, entity: Option<&str>) -> Result<()>;

    /// Snapshot of the full state
    fn state(&self) -> Result<SyncState>;
}
