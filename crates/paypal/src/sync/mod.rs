//! Incremental sync engine
//!
//! Entity descriptors, window scheduling, record transformation and the
//! runner that ties them to the API client and bookmark store.

mod runner;
mod sink;
mod streams;
mod transform;
mod windows;

pub use runner::{SyncOptions, SyncRunner, SyncStats, resume_order};
pub use sink::{CollectingSink, EmittedRecord, RecordSink};
pub use streams::{
    BALANCES, EntityDescriptor, Pagination, Replication, TRANSACTIONS, catalog, find_entity,
};
pub use transform::{RecordTransformer, flatten, page_context};
pub use windows::{Window, WindowSchedule, Windows, compute_windows};
