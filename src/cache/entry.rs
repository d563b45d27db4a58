//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::cache::Category;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Category the entry was filed under
    pub category: Category,
    /// The deserialized response
    pub value: Value,
    /// Insertion instant
    pub stored_at: Instant,
    /// TTL captured at insertion; reads never extend it
    pub ttl: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current instant.
    pub fn new(category: Category, value: Value, ttl: Duration) -> Self {
        Self {
            category,
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once its full TTL has elapsed, so a read at
    /// exactly `stored_at + ttl` already misses.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }

    // == Age ==
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    // == Time To Live ==
    /// Returns remaining TTL, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.age())
    }
}
