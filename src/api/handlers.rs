use super::protocol::*;
use crate::coordinator::Coordinator;
use crate::error::CoordinatorError;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::sync::Arc;

/// HTTP status for each outcome of the core.
pub fn status_for(error: &CoordinatorError) -> StatusCode {
    match error {
        CoordinatorError::NotFound(_) => StatusCode::NOT_FOUND,
        CoordinatorError::NoEligibleUnit => StatusCode::NOT_FOUND,
        CoordinatorError::Conflict(_) => StatusCode::CONFLICT,
        CoordinatorError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn error_response(operation: &str, error: &CoordinatorError) -> Response {
    if error.is_validation() || matches!(error, CoordinatorError::NoEligibleUnit) {
        tracing::debug!("{} rejected: {}", operation, error);
    } else {
        tracing::warn!("{} failed: {}", operation, error);
    }

    (
        status_for(error),
        Json(ErrorResponse {
            error: error.to_string(),
            retryable: error.is_retryable(),
        }),
    )
        .into_response()
}

pub async fn handle_claim(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Query(params): Query<ClaimParams>,
) -> Response {
    let requester = params.username.unwrap_or_default();

    match coordinator.claim_next(&requester).await {
        Ok(view) => (StatusCode::OK, Json(ClaimResponse::from(view))).into_response(),
        Err(e) => error_response("claim", &e),
    }
}

pub async fn handle_submit(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Json(req): Json<SubmitRequest>,
) -> Response {
    match coordinator.submit_result(req.into()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(SubmitResponse {
                accepted: true,
                message: "Submission accepted.".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response("submit", &e),
    }
}

pub async fn handle_stats(Extension(coordinator): Extension<Arc<Coordinator>>) -> Response {
    match coordinator.progress().await {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => error_response("stats", &e),
    }
}
