//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use request_cache::cache::{CacheStore, CategoryTable};
use request_cache::coordinator::{
    ApiRequest, Fetcher, InvalidationRules, RequestCoordinator, RetryPolicy, SessionHandler,
};
use request_cache::error::FetchError;
use serde_json::{json, Value};

// == Scripted Fetcher ==
/// Replays queued outcomes in order, then answers with a value echoing the
/// request. Every attempt sleeps `delay` first.
pub struct ScriptedFetcher {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<Value, FetchError>>>,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            delay,
        })
    }

    pub fn with_script(
        delay: Duration,
        outcomes: impl IntoIterator<Item = Result<Value, FetchError>>,
    ) -> Arc<Self> {
        let fetcher = Self::new(delay);
        fetcher.script.lock().unwrap().extend(outcomes);
        fetcher
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn perform(&self, request: &ApiRequest) -> Result<Value, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.script.lock().unwrap().pop_front();
        tokio::time::sleep(self.delay).await;

        scripted.unwrap_or_else(|| {
            Ok(json!({
                "method": request.method.as_str(),
                "endpoint": request.endpoint,
                "call": call,
            }))
        })
    }
}

// == Recording Session Handler ==
#[derive(Default)]
pub struct RecordingSession {
    pub failures: Mutex<Vec<String>>,
}

impl SessionHandler for RecordingSession {
    fn on_authorization_failure(&self, request: &ApiRequest) {
        self.failures.lock().unwrap().push(request.signature());
    }
}

// == Builders ==
pub fn category_table() -> CategoryTable {
    CategoryTable::new(Duration::from_secs(300))
        .with_category("items", Duration::from_secs(60))
        .with_category("users", Duration::from_secs(600))
        .with_category("metrics", Duration::from_secs(5))
}

pub fn coordinator(
    fetcher: Arc<ScriptedFetcher>,
    rules: InvalidationRules,
    retry: RetryPolicy,
) -> RequestCoordinator {
    let store = CacheStore::new(100, category_table()).shared();
    RequestCoordinator::new(store, fetcher, rules, retry)
}

pub fn network_error(message: &str) -> Result<Value, FetchError> {
    Err(FetchError::Network(message.to_string()))
}
