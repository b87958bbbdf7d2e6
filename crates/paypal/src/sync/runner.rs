//! Sync runner
//!
//! Drives each selected entity through `Idle -> Syncing(entity) -> Idle`:
//! mark the entity as syncing, extract window by window, advance the
//! bookmark once per completed window, then clear the marker. A fatal error
//! leaves the marker set so the next run resumes that entity first from its
//! last window-committed bookmark.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use super::transform::page_context;
use super::{
    EntityDescriptor, Pagination, RecordSink, RecordTransformer, Replication, Window,
    WindowSchedule,
};
use crate::api::{Pages, PaypalClient};
use crate::models::Record;
use crate::storage::BookmarkStore;
use crate::timestamp::format_timestamp;

/// Run-wide settings
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Bookmark used for entities that have none
    pub start_date: DateTime<Utc>,
    /// Days re-examined before each bookmark
    pub lookback_days: u32,
    /// Overrides the entity's own history limit when set
    pub max_history_days: Option<u32>,
    /// Fixed "now" for scheduling; wall clock when `None`
    pub now: Option<DateTime<Utc>>,
}

impl SyncOptions {
    pub fn new(start_date: DateTime<Utc>, lookback_days: u32) -> Self {
        Self {
            start_date,
            lookback_days,
            max_history_days: None,
            now: None,
        }
    }
}

/// Statistics from syncing one entity
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub entity: String,
    /// Windows completed
    pub windows: usize,
    /// Pages fetched
    pub pages: usize,
    /// Records handed to the sink
    pub records_emitted: usize,
    /// Records dropped in the overlap before a window start
    pub records_skipped: usize,
    /// Bookmark after the sync, for incremental entities
    pub bookmark: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

/// Records and progress gathered from one window or full-table pass
#[derive(Default)]
struct Pass {
    records: Vec<(Record, DateTime<Utc>)>,
    max_replication: Option<DateTime<Utc>>,
    pages: usize,
    skipped: usize,
}

/// Put an interrupted entity first, keeping the rest in their given order
pub fn resume_order<'e>(
    entities: &[&'e EntityDescriptor],
    currently_syncing: Option<&str>,
) -> Vec<&'e EntityDescriptor> {
    let mut ordered: Vec<&'e EntityDescriptor> = entities.to_vec();
    if let Some(name) = currently_syncing {
        match ordered.iter().position(|e| e.name == name) {
            Some(index) => {
                let interrupted = ordered.remove(index);
                ordered.insert(0, interrupted);
            }
            None => warn!(
                "Previous run was interrupted in {}, which is not selected",
                name
            ),
        }
    }
    ordered
}

/// Orchestrates extraction for a list of entities, strictly sequentially
pub struct SyncRunner<'a> {
    client: &'a PaypalClient,
    store: &'a dyn BookmarkStore,
    options: SyncOptions,
}

impl<'a> SyncRunner<'a> {
    pub fn new(client: &'a PaypalClient, store: &'a dyn BookmarkStore, options: SyncOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.options.now.unwrap_or_else(Utc::now)
    }

    /// Sync every entity, resuming an interrupted one first
    pub fn run(
        &self,
        entities: &[&EntityDescriptor],
        sink: &mut dyn RecordSink,
    ) -> Result<Vec<SyncStats>> {
        let state = self.store.state()?;
        if let Some(name) = &state.currently_syncing {
            info!("Resuming interrupted sync of {}", name);
        }

        let mut all_stats = Vec::new();
        for entity in resume_order(entities, state.currently_syncing.as_deref()) {
            all_stats.push(self.sync_entity(entity, sink)?);
        }
        info!("Finished sync of {} entities", all_stats.len());
        Ok(all_stats)
    }

    /// Sync one entity from its bookmark to now
    pub fn sync_entity(
        &self,
        entity: &EntityDescriptor,
        sink: &mut dyn RecordSink,
    ) -> Result<SyncStats> {
        let started = std::time::Instant::now();
        let mut stats = SyncStats {
            entity: entity.name.to_string(),
            ..SyncStats::default()
        };

        info!("Syncing entity: {}", entity.name);
        self.store.mark_syncing(Some(entity.name))?;
        sink.start_entity(entity)?;

        match entity.replication {
            Replication::Incremental {
                window_days,
                max_history_days,
                ..
            } => {
                let schedule = WindowSchedule {
                    lookback_days: self.options.lookback_days,
                    window_days,
                    max_history_days: self.options.max_history_days.or(max_history_days),
                };
                self.sync_incremental(entity, schedule, sink, &mut stats)?;
            }
            Replication::FullTable => self.sync_full_table(entity, sink, &mut stats)?,
        }

        self.store.mark_syncing(None)?;
        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Synced {}: {} records in {} windows ({} pages, {} skipped in overlap) in {}ms",
            entity.name,
            stats.records_emitted,
            stats.windows,
            stats.pages,
            stats.records_skipped,
            stats.duration_ms
        );
        Ok(stats)
    }

    fn sync_incremental(
        &self,
        entity: &EntityDescriptor,
        schedule: WindowSchedule,
        sink: &mut dyn RecordSink,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let mut bookmark = self
            .store
            .get_bookmark(entity.name, self.options.start_date)?;
        info!("{} bookmark: {}", entity.name, format_timestamp(bookmark));

        for window in schedule.windows(bookmark, self.now()) {
            debug!(
                "{} window {} to {}",
                entity.name,
                format_timestamp(window.start),
                format_timestamp(window.end)
            );

            let pass = self
                .collect_pass(entity, Some(window), Some(bookmark))
                .with_context(|| {
                    format!(
                        "Failed to sync {} window {} to {}",
                        entity.name,
                        format_timestamp(window.start),
                        format_timestamp(window.end)
                    )
                })?;

            self.emit(entity, &pass, sink, stats)?;

            // Compare against what is stored so the bookmark never moves back
            if let Some(candidate) = pass.max_replication {
                let stored = self
                    .store
                    .get_bookmark(entity.name, self.options.start_date)?;
                if candidate > stored {
                    self.store.set_bookmark(entity.name, candidate)?;
                    info!(
                        "{} bookmark advanced to {}",
                        entity.name,
                        format_timestamp(candidate)
                    );
                    bookmark = candidate;
                }
            }
            stats.windows += 1;
        }

        stats.bookmark = Some(bookmark);
        Ok(())
    }

    fn sync_full_table(
        &self,
        entity: &EntityDescriptor,
        sink: &mut dyn RecordSink,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let pass = self
            .collect_pass(entity, None, None)
            .with_context(|| format!("Failed to sync {}", entity.name))?;
        self.emit(entity, &pass, sink, stats)?;
        stats.windows += 1;
        Ok(())
    }

    fn pages(&self, entity: &EntityDescriptor, window: Option<&Window>) -> Result<Pages<'a>> {
        let (query, body) = entity.request_parts(window);
        let url = self.client.endpoint_url(entity.path, &query)?;
        Ok(match entity.pagination {
            Pagination::Cursor => self.client.pages(entity.method, url, body, entity.data_key),
            Pagination::None => self
                .client
                .single_page(entity.method, url, body, entity.data_key),
        })
    }

    /// Fetch and transform every page of one pass, emitting nothing
    fn collect_pass(
        &self,
        entity: &EntityDescriptor,
        window: Option<Window>,
        bookmark: Option<DateTime<Utc>>,
    ) -> Result<Pass> {
        let mut transformer = RecordTransformer::new(entity, window, bookmark);
        let mut pass = Pass::default();

        for page in self.pages(entity, window.as_ref())? {
            let page = page?;
            let extracted_at = Utc::now();
            let context = page_context(&page.envelope, entity.context_fields);
            for raw in page.data {
                if let Some(record) = transformer.transform(raw, &context)? {
                    pass.records.push((record, extracted_at));
                }
            }
            pass.pages += 1;
        }

        pass.max_replication = transformer.max_replication_value();
        pass.skipped = transformer.skipped();
        Ok(pass)
    }

    fn emit(
        &self,
        entity: &EntityDescriptor,
        pass: &Pass,
        sink: &mut dyn RecordSink,
        stats: &mut SyncStats,
    ) -> Result<()> {
        for (record, extracted_at) in &pass.records {
            sink.write_record(entity.name, record, *extracted_at)?;
        }
        stats.pages += pass.pages;
        stats.records_emitted += pass.records.len();
        stats.records_skipped += pass.skipped;
        Ok(())
    }
}
