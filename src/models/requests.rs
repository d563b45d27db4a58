//! Request DTOs for the sidecar API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::Category;
use crate::coordinator::{Action, ApiRequest, Method};

/// Request body for POST /read
#[derive(Debug, Clone, Deserialize)]
pub struct ReadRequest {
    pub method: Method,
    pub endpoint: String,
    /// Query parameters; part of the cache key
    #[serde(default)]
    pub params: Value,
    /// Category the response is cached under
    pub category: String,
}

impl ReadRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_common(&self.endpoint, &self.params).or_else(|| {
            self.category
                .trim()
                .is_empty()
                .then(|| "Category cannot be empty".to_string())
        })
    }

    pub fn api_request(&self) -> ApiRequest {
        ApiRequest::new(self.method, self.endpoint.trim()).with_params(self.params.clone())
    }

    pub fn category(&self) -> Category {
        Category::new(self.category.trim())
    }
}

/// Request body for POST /mutate
#[derive(Debug, Clone, Deserialize)]
pub struct MutateRequest {
    pub method: Method,
    pub endpoint: String,
    #[serde(default)]
    pub params: Value,
    /// Action name looked up in the invalidation table
    pub action: String,
}

impl MutateRequest {
    pub fn validate(&self) -> Option<String> {
        validate_common(&self.endpoint, &self.params).or_else(|| {
            self.action
                .trim()
                .is_empty()
                .then(|| "Action cannot be empty".to_string())
        })
    }

    pub fn api_request(&self) -> ApiRequest {
        ApiRequest::new(self.method, self.endpoint.trim()).with_params(self.params.clone())
    }

    pub fn action(&self) -> Action {
        Action::new(self.action.trim())
    }
}

/// Query string for DELETE /cache/:category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvalidateQuery {
    /// Optional regex restricting which keys are removed
    #[serde(default)]
    pub pattern: Option<String>,
}

fn validate_common(endpoint: &str, params: &Value) -> Option<String> {
    if endpoint.trim().is_empty() {
        return Some("Endpoint cannot be empty".to_string());
    }
    if !(params.is_null() || params.is_object()) {
        return Some("Params must be a JSON object".to_string());
    }
    None
}
