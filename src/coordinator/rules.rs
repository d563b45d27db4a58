//! Invalidation Rules Module
//!
//! Static action → category table applied after successful mutations.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStore, Category};
use crate::config::RuleConfig;
use crate::error::ConfigError;

// == Action ==
/// Name of a mutating operation, e.g. `create-item`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// == Invalidation Rule ==
#[derive(Debug, Clone)]
pub struct InvalidationRule {
    pub categories: Vec<Category>,
    pub key_pattern: Option<Regex>,
}

// == Rule Table ==
#[derive(Debug, Clone, Default)]
pub struct InvalidationRules {
    rules: HashMap<Action, Vec<InvalidationRule>>,
}

impl InvalidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table, rejecting rules that name a category for which
    /// `is_known` returns false, rules with no categories, and patterns
    /// that fail to compile.
    pub fn compile<F>(configs: &[RuleConfig], is_known: F) -> Result<Self, ConfigError>
    where
        F: Fn(&Category) -> bool,
    {
        let mut table = Self::new();

        for config in configs {
            if config.categories.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("invalidation rule '{}'", config.action),
                    reason: "must name at least one category".to_string(),
                });
            }

            let categories: Vec<Category> = config
                .categories
                .iter()
                .map(|name| Category::new(name.as_str()))
                .collect();
            if let Some(unknown) = categories.iter().find(|category| !is_known(category)) {
                return Err(ConfigError::UnknownCategory {
                    category: unknown.to_string(),
                    context: format!("invalidation rule '{}'", config.action),
                });
            }

            let key_pattern = config
                .key_pattern
                .as_deref()
                .map(compile_pattern)
                .transpose()?;

            table = table.with_rule(
                config.action.as_str(),
                InvalidationRule {
                    categories,
                    key_pattern,
                },
            );
        }

        Ok(table)
    }

    /// Adds a rule; an action may carry several.
    pub fn with_rule(mut self, action: impl Into<Action>, rule: InvalidationRule) -> Self {
        self.rules.entry(action.into()).or_default().push(rule);
        self
    }

    pub fn for_action(&self, action: &Action) -> &[InvalidationRule] {
        self.rules.get(action).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every category referenced by any rule.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.rules
            .values()
            .flatten()
            .flat_map(|rule| rule.categories.iter())
    }

    /// Every (category, key pattern) pair purged by `action`.
    pub fn targets<'a>(
        &'a self,
        action: &Action,
    ) -> impl Iterator<Item = (&'a Category, Option<&'a Regex>)> + 'a {
        self.for_action(action).iter().flat_map(|rule| {
            rule.categories
                .iter()
                .map(move |category| (category, rule.key_pattern.as_ref()))
        })
    }

    /// Purges every category mapped to `action`. Returns the count removed.
    pub fn apply(&self, action: &Action, store: &mut CacheStore) -> usize {
        self.targets(action)
            .map(|(category, pattern)| store.invalidate_category(category, pattern))
            .sum()
    }

    /// Number of actions with at least one rule.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compiles a key pattern, mapping failures to [`ConfigError::InvalidPattern`].
pub fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
