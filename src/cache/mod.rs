//! Cache Module
//!
//! Provides in-memory response caching with per-category TTL expiration
//! and oldest-first eviction.

mod age;
mod category;
mod entry;
mod stats;
mod store;


// Re-export public types
pub use age::AgeTracker;
pub use category::{Category, CategoryTable};
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::{CacheStore, SharedStore};
