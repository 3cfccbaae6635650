//! HTTP API Module
//!
//! Thin axum layer in front of the `Coordinator`: request parsing, status codes and
//! response framing only. All decisions are made in the core.
//!
//! ## Endpoints
//! - `GET /claim?username=...`: lease the next unit.
//! - `POST /submit`: report results for a unit.
//! - `GET /stats`: progress counts.

pub mod handlers;
pub mod protocol;

use crate::coordinator::Coordinator;
use axum::routing::{get, post};
use axum::{Extension, Router};
use handlers::{handle_claim, handle_stats, handle_submit};
use protocol::{ENDPOINT_CLAIM, ENDPOINT_STATS, ENDPOINT_SUBMIT};
use std::sync::Arc;

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route(ENDPOINT_CLAIM, get(handle_claim))
        .route(ENDPOINT_SUBMIT, post(handle_submit))
        .route(ENDPOINT_STATS, get(handle_stats))
        .layer(Extension(coordinator))
}

#[cfg(test)]
mod tests;
