//! Process lifecycle state machine and run loop.
//!
//! # State Transitions
//! ```text
//! Starting → Serving → Draining → Stopped
//! Starting → Stopped          (store connect failure, nothing to drain)
//! ```
//!
//! # Design Decisions
//! - Transitions are monotonic; a later state is never re-entered
//! - The store connection is owned here: created during Starting,
//!   dropped only after Stopped. No other component closes it.
//! - Draining is bounded by a fixed 10 second grace period, after
//!   which remaining connections are force-closed

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::Config;
use crate::gateway::StateGateway;
use crate::http::auth::BasicAccounts;
use crate::http::server::{build_router, AppState};
use crate::lifecycle::shutdown::{ShutdownCause, ShutdownHandle};
use crate::lifecycle::signals;
use crate::lock::LockCoordinator;
use crate::store::{EtcdStore, StateStore};

/// Bounded window for in-flight requests to finish during draining.
pub const GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Error that ends the process with a non-zero exit code.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct FatalError(pub String);

/// Observable lifecycle states, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    Starting,
    Serving,
    Draining,
    Stopped,
}

/// Owns startup, serving, and the exactly-once shutdown sequence.
pub struct Controller {
    config: Config,
    shutdown: ShutdownHandle,
    state_tx: watch::Sender<LifecycleState>,
    addr_tx: watch::Sender<Option<SocketAddr>>,
}

impl Controller {
    pub fn new(config: Config) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Starting);
        let (addr_tx, _) = watch::channel(None);
        Self {
            config,
            shutdown: ShutdownHandle::new(),
            state_tx,
            addr_tx,
        }
    }

    /// Handle other components use to request shutdown.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Watch lifecycle state transitions.
    pub fn state_watch(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Watch for the bound listener address, available once Serving.
    pub fn addr_watch(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.addr_tx.subscribe()
    }

    /// Connect to the store and serve until shutdown.
    ///
    /// This is the single logical waiter for the process outcome: it
    /// always returns, with `Ok` on a clean drain or the first fatal
    /// error encountered.
    pub async fn run(self) -> Result<(), FatalError> {
        let store = match EtcdStore::connect(&self.config.etcd).await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                // Never serve traffic without a working store connection.
                self.transition(LifecycleState::Stopped);
                return Err(FatalError(format!("etcd connection failed: {}", err)));
            }
        };
        self.serve_with_store(store).await
    }

    /// Serve requests against an already-connected store.
    pub async fn serve_with_store(
        self,
        store: Arc<dyn StateStore>,
    ) -> Result<(), FatalError> {
        let accounts = match &self.config.server.basic_auth {
            Some(path) => match BasicAccounts::load(path) {
                Ok(accounts) => Some(accounts),
                Err(err) => {
                    self.transition(LifecycleState::Stopped);
                    return Err(FatalError(err.to_string()));
                }
            },
            None => None,
        };

        let state = AppState {
            gateway: Arc::new(StateGateway::new(store.clone(), self.config.legacy.clone())),
            locks: Arc::new(LockCoordinator::new(
                store.clone(),
                Duration::from_secs(self.config.lock.timeout_secs),
                Duration::from_millis(self.config.lock.retry_interval_ms),
            )),
            store: store.clone(),
            shutdown: self.shutdown.clone(),
        };
        let router = build_router(&self.config, state, accounts);

        let addr: SocketAddr = match format!(
            "{}:{}",
            self.config.server.address, self.config.server.port
        )
        .parse()
        {
            Ok(addr) => addr,
            Err(err) => {
                self.transition(LifecycleState::Stopped);
                return Err(FatalError(format!("invalid bind address: {}", err)));
            }
        };

        let handle = axum_server::Handle::new();
        let server_handle = handle.clone();
        let tls = self.config.server.tls.clone();
        let mut server_task = tokio::spawn(async move {
            match tls {
                Some(tls) => {
                    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                        .await?;
                    axum_server::bind_rustls(addr, rustls)
                        .handle(server_handle)
                        .serve(router.into_make_service())
                        .await
                }
                None => {
                    axum_server::bind(addr)
                        .handle(server_handle)
                        .serve(router.into_make_service())
                        .await
                }
            }
        });

        signals::spawn_listener(self.shutdown.clone());

        if let Some(bound) = handle.listening().await {
            self.transition(LifecycleState::Serving);
            let _ = self.addr_tx.send(Some(bound));
            tracing::info!(address = %bound, "accepting connections");
        }

        tokio::select! {
            cause = self.shutdown.wait() => {
                self.transition(LifecycleState::Draining);
                handle.graceful_shutdown(Some(GRACE_PERIOD));
                let result = server_task.await;
                self.transition(LifecycleState::Stopped);

                if let ShutdownCause::Fatal(message) = cause {
                    return Err(FatalError(message));
                }
                match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(FatalError(err.to_string())),
                    Err(err) => Err(FatalError(err.to_string())),
                }
            }
            result = &mut server_task => {
                // The server quit on its own; that is always fatal.
                let message = match result {
                    Ok(Ok(())) => "server stopped unexpectedly".to_string(),
                    Ok(Err(err)) => err.to_string(),
                    Err(err) => err.to_string(),
                };
                self.shutdown.trigger(ShutdownCause::Fatal(message.clone()));
                self.transition(LifecycleState::Draining);
                self.transition(LifecycleState::Stopped);
                Err(FatalError(message))
            }
        }
        // `store` drops here, closing the connection after Stopped.
    }

    fn transition(&self, next: LifecycleState) {
        self.state_tx.send_if_modified(|current| {
            if next > *current {
                tracing::info!(from = ?*current, to = ?next, "lifecycle transition");
                *current = next;
                true
            } else {
                false
            }
        });
    }
}
