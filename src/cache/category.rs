//! Category Module
//!
//! Categories partition the keyspace and carry the TTL applied to their entries.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;

// == Category ==
/// Label grouping cache entries that share a freshness requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Composes the store key for an identifier within this category.
    pub fn key_for(&self, id: &str) -> String {
        format!("{}:{}", self.0, id)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// == Category Table ==
/// Category → TTL configuration with a fallback for unknown categories.
#[derive(Debug, Clone, Default)]
pub struct CategoryTable {
    ttls: HashMap<Category, Duration>,
    default_ttl: Duration,
}

impl CategoryTable {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            ttls: HashMap::new(),
            default_ttl,
        }
    }

    /// Adds or replaces a category. A zero TTL means "never cache".
    pub fn with_category(mut self, category: impl Into<Category>, ttl: Duration) -> Self {
        self.ttls.insert(category.into(), ttl);
        self
    }

    pub fn from_config(config: &Config) -> Self {
        config
            .categories
            .iter()
            .fold(Self::new(config.default_ttl()), |table, (name, ttl_ms)| {
                table.with_category(name.as_str(), Duration::from_millis(*ttl_ms))
            })
    }

    /// TTL for the category, or the default TTL when it is not configured.
    pub fn ttl_for(&self, category: &Category) -> Duration {
        self.ttls
            .get(category)
            .copied()
            .unwrap_or(self.default_ttl)
    }

    pub fn contains(&self, category: &Category) -> bool {
        self.ttls.contains_key(category)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn len(&self) -> usize {
        self.ttls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ttls.is_empty()
    }
}
