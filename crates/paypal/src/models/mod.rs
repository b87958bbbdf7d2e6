//! Domain models for extracted data and sync progress

mod record;
mod sync_state;

pub use record::Record;
pub use sync_state::SyncState;
