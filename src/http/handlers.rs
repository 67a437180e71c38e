//! Route handlers.
//!
//! Thin translation layer: resolve the namespace and parameters from
//! the query string, call the gateway or coordinator, and map the
//! result onto the response shapes Terraform's HTTP backend expects.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::lifecycle::ShutdownCause;
use crate::lock::LockOutcome;
use crate::store::StoreError;

/// Lease TTL applied when the client does not pass `lease_ttl`.
const DEFAULT_LEASE_TTL: i64 = 600;

#[derive(Debug, Deserialize)]
pub struct StateQuery {
    state: Option<String>,
    lease_ttl: Option<String>,
}

impl StateQuery {
    fn namespace(&self) -> Result<&str, GatewayError> {
        match self.state.as_deref() {
            Some(ns) if !ns.is_empty() => Ok(ns),
            _ => Err(GatewayError::InvalidRequest(
                "State query parameter is missing".into(),
            )),
        }
    }

    fn lease_ttl(&self) -> Result<i64, GatewayError> {
        match &self.lease_ttl {
            None => Ok(DEFAULT_LEASE_TTL),
            Some(raw) => raw.parse().map_err(|_| {
                GatewayError::InvalidRequest("Lease ttl needs to be in integer format".into())
            }),
        }
    }
}

/// `PUT /lock`
pub async fn acquire_lock(
    State(app): State<AppState>,
    Query(params): Query<StateQuery>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let namespace = params.namespace()?;
    let lease_ttl = params.lease_ttl()?;

    match app.locks.acquire(namespace, lease_ttl).await? {
        LockOutcome::Acquired(_) => Ok(Json(json!({ "status": "ok" }))),
        LockOutcome::Contested => Err(GatewayError::Contested),
    }
}

/// `DELETE /lock`
pub async fn release_lock(
    State(app): State<AppState>,
    Query(params): Query<StateQuery>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    app.locks.release(params.namespace()?).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// `GET /state`
pub async fn get_state(
    State(app): State<AppState>,
    Query(params): Query<StateQuery>,
) -> Result<Response, GatewayError> {
    let payload = app.gateway.get(params.namespace()?).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.size)
        .body(Body::from_stream(payload.data))
        .map_err(|e| StoreError::Stream(e.to_string()))?;
    Ok(response)
}

/// `PUT /state`
pub async fn put_state(
    State(app): State<AppState>,
    Query(params): Query<StateQuery>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let namespace = params.namespace()?;

    let size: i64 = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| {
            GatewayError::InvalidRequest("Content-Length header is required".into())
        })?;

    let stream = body
        .into_data_stream()
        .map_err(|e| StoreError::Stream(e.to_string()));

    let key = app
        .gateway
        .put(namespace, Box::pin(stream), size)
        .await?;
    Ok(Json(json!({ "state": key })))
}

/// `DELETE /state`
pub async fn delete_state(
    State(app): State<AppState>,
    Query(params): Query<StateQuery>,
) -> Result<Json<serde_json::Value>, GatewayError> {
    let key = app.gateway.delete(params.namespace()?).await?;
    Ok(Json(json!({ "state": key })))
}

/// `GET /health`
///
/// Healthy only while the store answers a membership query.
pub async fn health(State(app): State<AppState>) -> Result<Json<serde_json::Value>, GatewayError> {
    app.store.member_count().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// `POST /termination`
///
/// Only routed when enabled by configuration. Signals intent; the
/// lifecycle controller performs the actual drain, so the response
/// still goes out during the grace period.
pub async fn terminate(State(app): State<AppState>) -> impl IntoResponse {
    tracing::info!("termination triggered via api");
    app.shutdown.trigger(ShutdownCause::Remote);
    Json(json!({ "status": "ok" }))
}
