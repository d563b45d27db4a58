//! Request and Response models for the sidecar API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

pub use requests::{InvalidateQuery, MutateRequest, ReadRequest};
pub use responses::{
    ErrorResponse, HealthResponse, InvalidateResponse, MutateResponse, ReadResponse,
    StatsResponse,
};
