//! Integration Tests for the HTTP Fetcher
//!
//! Runs the fetcher against a throwaway upstream bound to an ephemeral port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Query,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use request_cache::coordinator::{ApiRequest, Fetcher, HttpFetcher, Method};
use request_cache::error::FetchError;
use serde_json::{json, Value};

// == Helper Functions ==

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/items",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                Json(json!({ "query": query }))
            })
            .post(|Json(body): Json<Value>| async move {
                (StatusCode::CREATED, Json(json!({ "created": body })))
            }),
        )
        .route("/private", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/forbidden", get(|| async { StatusCode::FORBIDDEN }))
        .route(
            "/flaky",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/empty", get(|| async { StatusCode::NO_CONTENT }))
        .route("/garbage", get(|| async { "definitely not json" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"late": true}))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn fetcher() -> HttpFetcher {
    let addr = spawn_upstream().await;
    HttpFetcher::new(format!("http://{}/", addr), Duration::from_millis(500)).unwrap()
}

// == Tests ==

#[tokio::test]
async fn test_get_sends_params_as_query() {
    let fetcher = fetcher().await;
    let request = ApiRequest::get("/items").with_params(json!({"q": "chair", "page": 2}));

    let value = fetcher.perform(&request).await.unwrap();

    assert_eq!(value, json!({"query": {"q": "chair", "page": "2"}}));
}

#[tokio::test]
async fn test_post_sends_params_as_body() {
    let fetcher = fetcher().await;
    let request = ApiRequest::new(Method::Post, "items").with_params(json!({"name": "chair"}));

    let value = fetcher.perform(&request).await.unwrap();

    assert_eq!(value, json!({"created": {"name": "chair"}}));
}

#[tokio::test]
async fn test_status_mapping() {
    let fetcher = fetcher().await;

    let unauthorized = fetcher.perform(&ApiRequest::get("/private")).await.unwrap_err();
    assert!(matches!(unauthorized, FetchError::Unauthorized(_)));
    assert!(unauthorized.is_authorization());

    let forbidden = fetcher.perform(&ApiRequest::get("/forbidden")).await.unwrap_err();
    assert!(forbidden.is_authorization());

    let flaky = fetcher.perform(&ApiRequest::get("/flaky")).await.unwrap_err();
    assert_eq!(
        flaky,
        FetchError::Status {
            status: 503,
            message: "try later".into(),
        }
    );
    assert!(flaky.is_retryable());

    let missing = fetcher.perform(&ApiRequest::get("/missing")).await.unwrap_err();
    assert!(matches!(missing, FetchError::Status { status: 404, .. }));
    assert!(!missing.is_retryable());
}

#[tokio::test]
async fn test_empty_body_is_null() {
    let fetcher = fetcher().await;
    let value = fetcher.perform(&ApiRequest::get("/empty")).await.unwrap();
    assert_eq!(value, Value::Null);
}

#[tokio::test]
async fn test_undecodable_body() {
    let fetcher = fetcher().await;
    let err = fetcher.perform(&ApiRequest::get("/garbage")).await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn test_transport_timeout() {
    let fetcher = fetcher().await;
    let err = fetcher.perform(&ApiRequest::get("/slow")).await.unwrap_err();
    assert_eq!(err, FetchError::Timeout(Duration::from_millis(500)));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let fetcher = HttpFetcher::new(format!("http://{}", addr), Duration::from_secs(1)).unwrap();
    let err = fetcher.perform(&ApiRequest::get("/items")).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
    assert!(err.is_retryable());
}
