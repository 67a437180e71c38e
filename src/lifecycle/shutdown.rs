//! Single-flight shutdown trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// What fired the shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGTERM or SIGINT.
    Signal,
    /// Authenticated `POST /termination` request.
    Remote,
    /// Unrecoverable error from the serving path.
    Fatal(String),
}

/// Shared trigger for the shutdown sequence.
///
/// Any number of sources may call [`trigger`](Self::trigger) from any
/// task; the atomic swap guarantees exactly one call wins and its cause
/// is the one the controller acts on. Later calls are no-ops.
#[derive(Clone)]
pub struct ShutdownHandle {
    fired: Arc<AtomicBool>,
    tx: Arc<watch::Sender<Option<ShutdownCause>>>,
    rx: watch::Receiver<Option<ShutdownCause>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request shutdown. Returns true if this call was the first and
    /// the sequence will run with this cause.
    pub fn trigger(&self, cause: ShutdownCause) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!(?cause, "shutdown already in progress, ignoring trigger");
            return false;
        }
        tracing::info!(?cause, "shutdown triggered");
        let _ = self.tx.send(Some(cause));
        true
    }

    /// Whether the sequence has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Wait for the first trigger and return its cause.
    pub async fn wait(&self) -> ShutdownCause {
        let mut rx = self.rx.clone();
        loop {
            if let Some(cause) = rx.borrow().clone() {
                return cause;
            }
            // The handle itself keeps the sender alive, so changed()
            // cannot fail while a waiter exists.
            if rx.changed().await.is_err() {
                return ShutdownCause::Fatal("shutdown channel closed".into());
            }
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
