//! Lock coordination subsystem.
//!
//! Presents the store's blocking, retrying lease-lock primitive as a
//! three-way outcome usable by request handlers: acquired, contested,
//! or backend failure. Contested is an expected state for Terraform
//! clients and is deliberately not an error.

use std::sync::Arc;
use std::time::Duration;

use crate::error::GatewayError;
use crate::gateway::keys;
use crate::store::{LockAttempt, LockHandle, StateStore};

/// Outcome of one acquisition request.
#[derive(Debug)]
pub enum LockOutcome {
    /// Lock taken. The handle is dropped at the end of the request;
    /// release happens by key via a later `DELETE /lock`.
    Acquired(LockHandle),
    /// Another holder kept the lock for the full acquisition window.
    Contested,
}

/// Wraps the store's lock primitive with parameter validation and
/// outcome translation.
pub struct LockCoordinator {
    store: Arc<dyn StateStore>,
    timeout: Duration,
    retry_interval: Duration,
}

impl LockCoordinator {
    pub fn new(store: Arc<dyn StateStore>, timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            store,
            timeout,
            retry_interval,
        }
    }

    /// Acquire the lock for `namespace` with the given lease TTL in
    /// seconds. The TTL bounds how long a crashed holder can keep the
    /// lock; a non-positive value is rejected before any store call.
    pub async fn acquire(
        &self,
        namespace: &str,
        lease_ttl: i64,
    ) -> Result<LockOutcome, GatewayError> {
        let namespace = validate(namespace)?;
        if lease_ttl <= 0 {
            return Err(GatewayError::InvalidRequest(
                "Lease ttl must be a positive integer".into(),
            ));
        }

        let key = keys::lock_key(namespace);
        let attempt = self
            .store
            .acquire_lock(&key, lease_ttl, self.timeout, self.retry_interval)
            .await?;

        match attempt {
            LockAttempt::Acquired(handle) => {
                tracing::debug!(key = %key, lease_id = handle.lease_id(), "lock acquired");
                Ok(LockOutcome::Acquired(handle))
            }
            LockAttempt::AlreadyLocked => Ok(LockOutcome::Contested),
        }
    }

    /// Release the lock for `namespace`.
    ///
    /// Idempotent by contract: releasing a lock that is not held is a
    /// success, so a client can safely retry a release after an
    /// ambiguous response. Only store unreachability is an error.
    pub async fn release(&self, namespace: &str) -> Result<(), GatewayError> {
        let key = keys::lock_key(validate(namespace)?);
        self.store.release_lock(&key).await?;
        tracing::debug!(key = %key, "lock released");
        Ok(())
    }
}

fn validate(namespace: &str) -> Result<&str, GatewayError> {
    if namespace.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "State query parameter is missing".into(),
        ));
    }
    Ok(namespace)
}
