//! # API Endpoint Handlers
//!
//! One submodule per area. Handlers validate nothing themselves: the core
//! does, and its errors become responses through [`super::ApiError`].

pub mod inbox;
pub mod interactions;
pub mod posts;
pub mod relationships;
pub mod users;

use super::types::HealthResponse;
use axum::{Json, response::IntoResponse};

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}
