//! JSON file storage implementation
//!
//! Holds the state in memory and rewrites the whole document on every
//! mutation. Writes go through [`config::save_json_file`], which replaces
//! the file atomically.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::BookmarkStore;
use crate::models::SyncState;

/// BookmarkStore persisted to a JSON state file
pub struct JsonFileBookmarkStore {
    path: PathBuf,
    state: RwLock<SyncState>,
}

impl JsonFileBookmarkStore {
    /// Open the state file at `path`, starting empty if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state: SyncState = config::load_json_file_opt(&path)
            .with_context(|| format!("Failed to load state from {}", path.display()))?
            .unwrap_or_default();

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy, write it, then swap it in
    ///
    /// A failed write leaves the in-memory state as it was on disk.
    fn update(&self, change: impl FnOnce(&mut SyncState)) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let mut next = state.clone();
        change(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    fn persist(&self, state: &SyncState) -> Result<()> {
        config::save_json_file(&self.path, state)
            .with_context(|| format!("Failed to write state to {}", self.path.display()))?;
        debug!("State written to {}", self.path.display());
        Ok(())
    }
}

impl BookmarkStore for JsonFileBookmarkStore {
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
        self.update(|state| state.set_bookmark(entity, value))
    }

    fn mark_syncing(&self, entity: Option<&str>) -> Result<()> {
        self.update(|state| state.set_currently_syncing(entity))
    }

    fn state(&self) -> Result<SyncState> {
        Ok(self.state.read().unwrap().clone())
    }
}
