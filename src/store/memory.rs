//! In-memory store fake for tests.
//!
//! Mirrors the `StateStore` contract over hash maps so gateway, lock,
//! and HTTP behavior can be exercised without an etcd cluster. Records
//! every call and supports flipping the whole store into an unavailable
//! state to drive the backend-failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::store::{ByteStream, LockAttempt, LockHandle, StateStore, StatePayload, StoreError};

#[derive(Default)]
struct Inner {
    chunked: HashMap<String, Bytes>,
    plain: HashMap<String, Bytes>,
    locks: HashMap<String, i64>,
    next_lease: i64,
    unavailable: bool,
    failing_ops: HashSet<String>,
    latency: Option<Duration>,
    calls: Vec<String>,
}

/// In-memory `StateStore` implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Make one named operation fail while everything else keeps working.
    pub fn fail_op(&self, op: &str) {
        self.lock().failing_ops.insert(op.to_string());
    }

    /// Delay every call, simulating a slow store for drain tests.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Seed a plain (legacy layout) key.
    pub fn seed_plain(&self, key: &str, value: &[u8]) {
        self.lock()
            .plain
            .insert(key.to_string(), Bytes::copy_from_slice(value));
    }

    /// Whether a plain key currently exists.
    pub fn has_plain(&self, key: &str) -> bool {
        self.lock().plain.contains_key(key)
    }

    /// Whether a chunked blob currently exists.
    pub fn has_chunked(&self, key: &str) -> bool {
        self.lock().chunked.contains_key(key)
    }

    /// Names of all store calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn record(&self, op: &str, key: &str) -> Result<(), StoreError> {
        let latency = {
            let mut inner = self.lock();
            inner.calls.push(format!("{} {}", op, key));
            if inner.unavailable || inner.failing_ops.contains(op) {
                return Err(StoreError::Unavailable("store is down".into()));
            }
            inner.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn acquire_lock(
        &self,
        key: &str,
        _lease_ttl: i64,
        _timeout: Duration,
        _retry_interval: Duration,
    ) -> Result<LockAttempt, StoreError> {
        self.record("acquire_lock", key).await?;
        let mut inner = self.lock();
        if inner.locks.contains_key(key) {
            return Ok(LockAttempt::AlreadyLocked);
        }
        inner.next_lease += 1;
        let lease = inner.next_lease;
        inner.locks.insert(key.to_string(), lease);
        Ok(LockAttempt::Acquired(LockHandle::new(lease)))
    }

    async fn release_lock(&self, key: &str) -> Result<(), StoreError> {
        self.record("release_lock", key).await?;
        self.lock().locks.remove(key);
        Ok(())
    }

    async fn put_chunked(
        &self,
        key: &str,
        mut data: ByteStream,
        size: i64,
    ) -> Result<(), StoreError> {
        self.record("put_chunked", key).await?;
        let mut buf = BytesMut::new();
        while let Some(chunk) = data.next().await {
            buf.extend_from_slice(&chunk?);
        }
        if buf.len() as i64 != size {
            return Err(StoreError::Stream(format!(
                "declared size {} but received {} bytes",
                size,
                buf.len()
            )));
        }
        self.lock().chunked.insert(key.to_string(), buf.freeze());
        Ok(())
    }

    async fn get_chunked(&self, key: &str) -> Result<Option<StatePayload>, StoreError> {
        self.record("get_chunked", key).await?;
        Ok(self
            .lock()
            .chunked
            .get(key)
            .cloned()
            .map(StatePayload::from_bytes))
    }

    async fn delete_chunked(&self, key: &str) -> Result<(), StoreError> {
        self.record("delete_chunked", key).await?;
        self.lock().chunked.remove(key);
        Ok(())
    }

    async fn get_plain(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        self.record("get_plain", key).await?;
        Ok(self.lock().plain.get(key).cloned())
    }

    async fn delete_plain(&self, key: &str) -> Result<(), StoreError> {
        self.record("delete_plain", key).await?;
        self.lock().plain.remove(key);
        Ok(())
    }

    async fn member_count(&self) -> Result<usize, StoreError> {
        self.record("member_count", "").await?;
        Ok(1)
    }
}
