//! Router construction.
//!
//! # Responsibilities
//! - Create the Axum router with all route handlers
//! - Inject shared state (gateway, coordinator, store, shutdown handle)
//! - Wire up middleware (tracing, optional basic auth)
//! - Route `/termination` only when configuration enables it

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gateway::StateGateway;
use crate::http::auth::{basic_auth_middleware, BasicAccounts};
use crate::http::handlers;
use crate::lifecycle::ShutdownHandle;
use crate::lock::LockCoordinator;
use crate::store::StateStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<StateGateway>,
    pub locks: Arc<LockCoordinator>,
    /// Used directly only by the health check.
    pub store: Arc<dyn StateStore>,
    pub shutdown: ShutdownHandle,
}

/// Build the router with all routes and middleware layers.
pub fn build_router(config: &Config, state: AppState, accounts: Option<BasicAccounts>) -> Router {
    let mut router = Router::new()
        .route(
            "/lock",
            put(handlers::acquire_lock).delete(handlers::release_lock),
        )
        .route(
            "/state",
            get(handlers::get_state)
                .put(handlers::put_state)
                .delete(handlers::delete_state),
        )
        .route("/health", get(handlers::health));

    // A privileged, optionally-exposed operation: absent from the
    // routing table entirely unless switched on.
    if config.server.remote_termination {
        router = router.route("/termination", post(handlers::terminate));
    }

    let mut router = router
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(accounts) = accounts {
        router = router.layer(middleware::from_fn_with_state(
            Arc::new(accounts),
            basic_auth_middleware,
        ));
    }

    router
}
