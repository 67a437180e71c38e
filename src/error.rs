//! Error taxonomy for the gateway.
//!
//! # Design Decisions
//! - One error type crosses the handler boundary; each variant maps to
//!   exactly one HTTP status
//! - `Contested` is a normal outcome for Terraform clients, not a failure;
//!   it is never logged at error level
//! - Backend errors carry the store's message through to the response body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Failure modes surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or malformed request parameter. Surfaced as 400.
    #[error("{0}")]
    InvalidRequest(String),

    /// The lock is already held by another client. Surfaced as 423.
    #[error("state is locked")]
    Contested,

    /// No state stored under the requested namespace. Surfaced as 404.
    #[error("not found")]
    NotFound,

    /// The store was unreachable or returned a protocol error. Surfaced as 500.
    #[error(transparent)]
    Backend(#[from] StoreError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),
            GatewayError::Contested => (
                StatusCode::LOCKED,
                Json(json!({ "status": "locked" })),
            )
                .into_response(),
            GatewayError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "not found" })),
            )
                .into_response(),
            GatewayError::Backend(err) => {
                tracing::error!(error = %err, "store operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "error", "error": err.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
