//! Request Cache - client-side response cache and request coordinator
//!
//! Cache-aside reads with per-category TTLs, in-flight coalescing, retries
//! with linear backoff, and rule-based invalidation after mutations.

pub mod api;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStore, Category, SharedStore};
pub use config::Config;
pub use coordinator::{Action, ApiRequest, Fetcher, HttpFetcher, Method, RequestCoordinator};
pub use error::{ConfigError, CoordinatorError, FetchError};
pub use tasks::{spawn_sweep_task, SweepTask};
