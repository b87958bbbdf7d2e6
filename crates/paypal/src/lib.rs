//! PayPal crate - Incremental extraction from the PayPal REST API
//!
//! This crate provides:
//! - OAuth client-credentials login with background token renewal
//! - A retrying, paginating API client behind a swappable HTTP transport
//! - Day-aligned window scheduling with lookback
//! - Record flattening and window boundary deduplication
//! - Bookmark persistence and a resumable sync runner
//!
//! The engine is synchronous; every HTTP call blocks the sync path.

pub mod api;
pub mod config;
pub mod models;
pub mod storage;
pub mod sync;
pub mod timestamp;

pub use crate::config::TapConfig;
pub use api::{
    AccessToken, Credentials, FetchError, HttpRequest, HttpResponse, LIVE_BASE_URL, Method,
    PaypalClient, RequestBody, RetryPolicy, SANDBOX_BASE_URL, ScriptedTransport, TokenManager,
    Transport, TransportError, UreqTransport,
};
pub use models::{Record, SyncState};
pub use storage::{BookmarkStore, InMemoryBookmarkStore, JsonFileBookmarkStore};
pub use sync::{
    // Entities
    BALANCES, EntityDescriptor, TRANSACTIONS, catalog, find_entity,
    // Execution
    CollectingSink, RecordSink, SyncOptions, SyncRunner, SyncStats,
    // Scheduling
    Window, compute_windows,
};
