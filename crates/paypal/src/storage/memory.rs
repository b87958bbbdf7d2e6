//! In-memory storage implementation
//!
//! Used for tests. Keeps every bookmark write so callers can assert on the
//! sequence of values, not just the final one.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::sync::RwLock;

use super::BookmarkStore;
use crate::models::SyncState;

/// In-memory implementation of BookmarkStore
pub struct InMemoryBookmarkStore {
    state: RwLock<SyncState>,
    /// Every set_bookmark call, in order
    history: RwLock<Vec<(String, DateTime<Utc>)>>,
}

impl InMemoryBookmarkStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_state(SyncState::default())
    }

    /// Create a store seeded with existing state
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: RwLock::new(state),
            history: RwLock::new(Vec::new()),
        }
    }

    /// Bookmark writes for one entity, in the order they happened
    pub fn bookmark_history(&self, entity: &str) -> Vec<DateTime<Utc>> {
        self.history
            .read()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == entity)
            .map(|(_, value)| *value)
            .collect()
    }
}

impl Default for InMemoryBookmarkStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BookmarkStore for InMemoryBookmarkStore {
    fn get_bookmark(&self, entity: &str, default: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let state = self.state.read().unwrap();
        match state.bookmark(entity) {
            None => Ok(default),
            Some(raw) => match state.bookmark_time(entity) {
                Some(value) => Ok(value),
                None => bail!("Stored bookmark for {} is not a timestamp: {}", entity, raw),
            },
        }
    }

    fn set_bookmark(&self, entity: &str, value: DateTime<Utc>) -> Result<()> {
        self.state.write().unwrap().set_bookmark(entity, value);
        self.history
            .write()
            .unwrap()
            .push((entity.to_string(), value));
        Ok(())
    }

    fn mark_syncing(&self, entity: Option<&str>) -> Result<()> {
        self.state.write().unwrap().set_currently_syncing(entity);
        Ok(())
    }

    fn state(&self) -> Result<SyncState> {
        Ok(self.state.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_get_returns_default_when_missing() {
        let store = InMemoryBookmarkStore::new();
        assert_eq!(store.get_bookmark("transactions", day(1)).unwrap(), day(1));
    }

    #[test]
    fn test_set_then_get() {
        let store = InMemoryBookmarkStore::new();
        store.set_bookmark("transactions", day(5)).unwrap();
        assert_eq!(store.get_bookmark("transactions", day(1)).unwrap(), day(5));
        assert_eq!(store.bookmark_history("transactions"), vec![day(5)]);
        assert!(store.bookmark_history("balances").is_empty());
    }

    #[test]
    fn test_mark_syncing() {
        let store = InMemoryBookmarkStore::new();
        store.mark_syncing(Some("transactions")).unwrap();
        assert_eq!(
            store.state().unwrap().currently_syncing.as_deref(),
            Some("transactions")
        );
        store.mark_syncing(None).unwrap();
        assert!(store.state().unwrap().currently_syncing.is_none());
    }

    #[test]
    fn test_corrupt_bookmark_is_an_error() {
        let mut state = SyncState::new();
        state
            .bookmarks
            .insert("transactions".into(), "garbage".into());
        let store = InMemoryBookmarkStore::with_state(state);
        assert!(store.get_bookmark("transactions", day(1)).is_err());
    }
}
