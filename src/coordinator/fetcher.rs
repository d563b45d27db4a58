//! Collaborator Traits
//!
//! The coordinator consumes a network capability and notifies a session
//! handler on authorization failures; both live outside this crate's scope.

use async_trait::async_trait;
use serde_json::Value;

use crate::coordinator::ApiRequest;
use crate::error::FetchError;

/// Performs one attempt of a request against the upstream API.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn perform(&self, request: &ApiRequest) -> Result<Value, FetchError>;
}

/// Receives the signal that the caller's session is no longer valid.
pub trait SessionHandler: Send + Sync + 'static {
    fn on_authorization_failure(&self, request: &ApiRequest);
}

/// Session handler that ignores the signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionHandler;

impl SessionHandler for NoopSessionHandler {
    fn on_authorization_failure(&self, _request: &ApiRequest) {}
}
