//! API Module
//!
//! HTTP handlers and routing for the coordinator sidecar.
//!
//! # Endpoints
//! - `POST /read` - Cached, coalesced read
//! - `POST /mutate` - Mutation with rule-based invalidation
//! - `DELETE /cache/:category` - Manual invalidation
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
