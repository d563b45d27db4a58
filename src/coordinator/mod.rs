//! Request Coordinator Module
//!
//! Turns idempotent reads into cached, deduplicated, retried operations and
//! mutations into operations that also purge affected cache state.
//!
//! # Read path
//! 1. Cache hit: return the stored value
//! 2. Pending request for the same signature: wait for its outcome
//! 3. Otherwise: register a pending request and spawn the fetch
//!
//! The hit/pending/new decision is made under the pending-map lock, so
//! each signature has at most one fetch in flight. The fetch itself runs on
//! a spawned task; a caller dropping its future cannot strand the others.
//!
//! Invalidation detaches pending fetches of the purged categories and moves
//! the store's category generation, so a fetch that started before a
//! successful mutation never writes its result back into the cache.

mod fetcher;
pub mod http;
mod retry;
mod rules;
mod signature;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, Category, SharedStore};
use crate::config::Config;
use crate::error::{ConfigError, CoordinatorError, Result};

pub use fetcher::{Fetcher, NoopSessionHandler, SessionHandler};
pub use http::HttpFetcher;
pub use retry::RetryPolicy;
pub use rules::{compile_pattern, Action, InvalidationRule, InvalidationRules};
pub use signature::{signature, ApiRequest, Method};

/// Outcome shared by every caller attached to one fetch.
type Outcome = Result<Value>;
type PendingMap = HashMap<String, Pending>;

struct Pending {
    category: Category,
    /// Store generation of `category` when the fetch started
    generation: u64,
    receiver: watch::Receiver<Option<Outcome>>,
}

// == Request Coordinator ==
/// Cheap to clone; clones share the pending map and the store.
#[derive(Clone)]
pub struct RequestCoordinator {
    store: SharedStore,
    fetcher: Arc<dyn Fetcher>,
    session: Arc<dyn SessionHandler>,
    rules: Arc<InvalidationRules>,
    retry: RetryPolicy,
    pending: Arc<Mutex<PendingMap>>,
}

impl RequestCoordinator {
    // == Constructors ==
    pub fn new(
        store: SharedStore,
        fetcher: Arc<dyn Fetcher>,
        rules: InvalidationRules,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            session: Arc::new(NoopSessionHandler),
            rules: Arc::new(rules),
            retry,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Builds a coordinator from configuration, validating the rule table
    /// against the categories the shared store knows about.
    pub async fn from_config(
        store: SharedStore,
        fetcher: Arc<dyn Fetcher>,
        config: &Config,
    ) -> std::result::Result<Self, ConfigError> {
        let rules = {
            let guard = store.read().await;
            InvalidationRules::compile(&config.invalidation_rules, |category: &Category| {
                guard.knows_category(category)
            })?
        };

        Ok(Self::new(store, fetcher, rules, RetryPolicy::from_config(config)))
    }

    pub fn with_session_handler(mut self, session: Arc<dyn SessionHandler>) -> Self {
        self.session = session;
        self
    }

    // == Read ==
    /// Cache-aside, coalesced, retried read.
    ///
    /// Every caller that arrives while a fetch for the same signature is in
    /// flight receives that fetch's value or error.
    pub async fn read(&self, request: &ApiRequest, category: &Category) -> Result<Value> {
        let key = category.key_for(&request.signature());

        let mut receiver = {
            let mut pending = self.pending.lock().await;

            let generation = {
                let mut store = self.store.write().await;
                if let Some(value) = store.get(&key, category) {
                    debug!("Cache hit for {}", key);
                    return Ok(value);
                }
                store.generation(category)
            };

            // A fetch from an older generation was overtaken by an
            // invalidation, possibly through another coordinator
            let in_flight = pending
                .get(&key)
                .filter(|entry| entry.generation == generation)
                .map(|entry| &entry.receiver)
                .filter(|receiver| !is_abandoned(receiver))
                .cloned();

            match in_flight {
                Some(receiver) => {
                    debug!("Joining in-flight request for {}", key);
                    receiver
                }
                None => {
                    debug!("Cache miss for {}, fetching", key);
                    let (sender, receiver) = watch::channel(None);
                    pending.insert(
                        key.clone(),
                        Pending {
                            category: category.clone(),
                            generation,
                            receiver: receiver.clone(),
                        },
                    );
                    self.spawn_fetch(key, category.clone(), generation, request.clone(), sender);
                    receiver
                }
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone().unwrap_or_else(|| Err(abandoned())),
            Err(_) => Err(abandoned()),
        };
        outcome
    }

    // == Mutate ==
    /// Executes a mutating request (no cache lookup, no coalescing) and on
    /// success purges every category mapped to `action`.
    ///
    /// A failed mutation, including one that exhausted its retries, leaves
    /// the cache untouched.
    pub async fn mutate(&self, request: &ApiRequest, action: &Action) -> Result<Value> {
        let value = self.execute(request).await?;

        if self.rules.for_action(action).is_empty() {
            warn!("No invalidation rules for action {}", action);
            return Ok(value);
        }

        let removed = {
            let mut pending = self.pending.lock().await;
            let mut store = self.store.write().await;
            for (category, pattern) in self.rules.targets(action) {
                detach_pending(&mut pending, category, pattern);
            }
            self.rules.apply(action, &mut store)
        };
        info!("Action {} invalidated {} cache entries", action, removed);

        Ok(value)
    }

    // == Invalidate ==
    /// Manual invalidation for callers that know a category is stale.
    pub async fn invalidate(&self, category: &Category, key_pattern: Option<&str>) -> Result<usize> {
        let pattern = key_pattern.map(compile_pattern).transpose()?;
        let removed = {
            let mut pending = self.pending.lock().await;
            detach_pending(&mut pending, category, pattern.as_ref());
            self.store
                .write()
                .await
                .invalidate_category(category, pattern.as_ref())
        };
        info!("Manually invalidated {} entries in {}", removed, category);
        Ok(removed)
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Number of fetches currently in flight.
    pub async fn in_flight(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    pub fn rules(&self) -> &InvalidationRules {
        &self.rules
    }

    // == Internals ==
    fn spawn_fetch(
        &self,
        key: String,
        category: Category,
        generation: u64,
        request: ApiRequest,
        sender: watch::Sender<Option<Outcome>>,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.execute(&request).await;

            // Store, publish and detach under one pending lock: no caller can
            // join a settled fetch, and no invalidation can slip in between.
            let mut pending = this.pending.lock().await;
            if let Ok(value) = &outcome {
                this.store
                    .write()
                    .await
                    .set_if_current(key.clone(), &category, value.clone(), generation);
            }

            let own = sender.subscribe();
            sender.send_replace(Some(outcome));
            // The entry may already belong to a newer fetch after a detach
            if pending
                .get(&key)
                .is_some_and(|entry| entry.receiver.same_channel(&own))
            {
                pending.remove(&key);
            }
        });
    }

    async fn execute(&self, request: &ApiRequest) -> Outcome {
        let label = request.signature();
        let outcome = self
            .retry
            .execute(&label, || self.fetcher.perform(request))
            .await;

        if let Err(CoordinatorError::Authorization(_)) = &outcome {
            self.session.on_authorization_failure(request);
        }
        outcome
    }
}

impl std::fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("retry", &self.retry)
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

/// Drops pending entries of `category` (matching `pattern`, if any) so that
/// later reads start a fresh fetch. Callers already attached keep waiting
/// on the detached fetch.
fn detach_pending(pending: &mut PendingMap, category: &Category, pattern: Option<&Regex>) {
    let before = pending.len();
    pending.retain(|key, entry| {
        &entry.category != category || pattern.is_some_and(|pattern| !pattern.is_match(key))
    });

    let detached = before - pending.len();
    if detached > 0 {
        debug!("Detached {} in-flight requests in {}", detached, category);
    }
}

/// A fetch task that died without publishing leaves a closed, empty channel.
fn is_abandoned(receiver: &watch::Receiver<Option<Outcome>>) -> bool {
    receiver.borrow().is_none() && receiver.has_changed().is_err()
}

fn abandoned() -> CoordinatorError {
    CoordinatorError::Internal("in-flight request ended without an outcome".to_string())
}
