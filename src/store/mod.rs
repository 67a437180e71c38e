//! Store client abstraction.
//!
//! # Data Flow
//! ```text
//! gateway / lock coordinator
//!     → StateStore trait (this module)
//!     → etcd.rs (production: etcd-client over gRPC)
//!     → memory.rs (tests: in-memory fake with failure injection)
//! ```
//!
//! # Design Decisions
//! - One trait object shared by every in-flight request; implementations
//!   must be safe for concurrent use
//! - Chunked and plain key spaces are separate operations because the
//!   legacy layout predates chunking and is read through the plain path
//! - `get_chunked` distinguishes "absent" from "failed"; only transport
//!   and protocol problems are errors

pub mod etcd;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

/// Stream of body chunks flowing to or from the store.
pub type ByteStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("etcd request failed: {0}")]
    Etcd(#[from] etcd_client::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("payload stream aborted: {0}")]
    Stream(String),
}

/// A state blob read back from the store: declared size plus the bytes.
///
/// Dropping the payload releases the underlying stream, so every exit
/// path (full transmission or early termination) cleans up the same way.
pub struct StatePayload {
    pub size: i64,
    pub data: ByteStream,
}

impl StatePayload {
    /// Wrap an already-materialized value, as the legacy read path does.
    pub fn from_bytes(bytes: Bytes) -> Self {
        let size = bytes.len() as i64;
        Self {
            size,
            data: Box::pin(futures_util::stream::once(async move { Ok(bytes) })),
        }
    }
}

/// Token proving a lock acquisition succeeded.
///
/// The handle is not persisted across requests; Terraform releases the
/// lock with a separate `DELETE /lock` call, so the store keys the lock
/// by name rather than by handle.
#[derive(Debug)]
pub struct LockHandle {
    lease_id: i64,
}

impl LockHandle {
    pub(crate) fn new(lease_id: i64) -> Self {
        Self { lease_id }
    }

    pub fn lease_id(&self) -> i64 {
        self.lease_id
    }
}

/// Result of one lock acquisition attempt.
#[derive(Debug)]
pub enum LockAttempt {
    Acquired(LockHandle),
    /// Another holder kept the lock for the whole acquisition window.
    AlreadyLocked,
}

/// Operations the gateway consumes from the distributed store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Try to take the lock at `key`, retrying every `retry_interval`
    /// until success or `timeout` elapses. The lock auto-expires after
    /// `lease_ttl` seconds if never released.
    async fn acquire_lock(
        &self,
        key: &str,
        lease_ttl: i64,
        timeout: Duration,
        retry_interval: Duration,
    ) -> Result<LockAttempt, StoreError>;

    /// Release the lock at `key`. Releasing a lock that is not held
    /// succeeds; only store unreachability is an error.
    async fn release_lock(&self, key: &str) -> Result<(), StoreError>;

    /// Write a blob under `key`, split into chunked records.
    async fn put_chunked(&self, key: &str, data: ByteStream, size: i64) -> Result<(), StoreError>;

    /// Read the blob under `key`, or `None` if absent.
    async fn get_chunked(&self, key: &str) -> Result<Option<StatePayload>, StoreError>;

    /// Delete the blob under `key`. Deleting an absent key succeeds.
    async fn delete_chunked(&self, key: &str) -> Result<(), StoreError>;

    /// Read a single-record key. Used only for the legacy layout.
    async fn get_plain(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    /// Delete a single-record key. Used only for legacy cleanup.
    async fn delete_plain(&self, key: &str) -> Result<(), StoreError>;

    /// Number of reachable cluster members. Used by health checks.
    async fn member_count(&self) -> Result<usize, StoreError>;
}
