//! OS signal handling.
//!
//! Translates SIGTERM/SIGINT into a shutdown trigger. Signals share the
//! single-flight handle with the remote-termination route and the fatal
//! error path, so a signal arriving mid-drain is a no-op.

use crate::lifecycle::shutdown::{ShutdownCause, ShutdownHandle};

/// Spawn a task that fires the shutdown handle on SIGTERM or SIGINT.
pub fn spawn_listener(shutdown: ShutdownHandle) {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger(ShutdownCause::Signal);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            tracing::error!(error = %err, "cannot register SIGTERM handler");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("caught SIGTERM, terminating"),
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(error = %err, "cannot listen for SIGINT");
                return std::future::pending().await;
            }
            tracing::info!("caught SIGINT, terminating");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c");
        return std::future::pending().await;
    }
    tracing::info!("caught interrupt, terminating");
}
