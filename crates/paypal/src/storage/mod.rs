//! Bookmark storage traits and implementations
//!
//! The sync runner persists progress through the [`BookmarkStore`] trait.
//! The in-memory store backs tests; the JSON file store is what the tap
//! uses between runs.

mod file;
mod memory;
mod traits;

pub use file::JsonFileBookmarkStore;
pub use memory::InMemoryBookmarkStore;
pub use traits::BookmarkStore;
