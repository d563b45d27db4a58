//! HTTP Fetcher
//!
//! `reqwest` implementation of the network capability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::coordinator::{ApiRequest, Fetcher, Method};
use crate::error::{ConfigError, FetchError};

/// Issues requests against `base_url`, mapping transport and status
/// failures onto [`FetchError`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim().trim_start_matches('/'))
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn perform(&self, request: &ApiRequest) -> Result<Value, FetchError> {
        let url = self.url_for(&request.endpoint);

        let builder = match request.method {
            Method::Get => self.client.get(&url).query(&query_pairs(&request.params)),
            Method::Delete => self.client.delete(&url).query(&query_pairs(&request.params)),
            Method::Post => with_body(self.client.post(&url), &request.params),
            Method::Put => with_body(self.client.put(&url), &request.params),
            Method::Patch => with_body(self.client.patch(&url), &request.params),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(format!(
                "{} {} returned {}",
                request.method, request.endpoint, status
            )));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn with_body(builder: reqwest::RequestBuilder, params: &Value) -> reqwest::RequestBuilder {
    if params.is_null() {
        builder
    } else {
        builder.json(params)
    }
}

/// Flattens a params object into query pairs. Strings are sent raw, other
/// values as JSON text; nulls are skipped.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = params else {
        return Vec::new();
    };

    let mut pairs: Vec<(String, String)> = map
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect();
    pairs.sort();
    pairs
}
