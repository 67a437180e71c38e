//! etcd-backed store client.
//!
//! # Responsibilities
//! - Connect to the etcd cluster (TLS and user auth per config)
//! - Lease-based lock acquisition with bounded retry
//! - Chunked blob storage split across multiple records
//! - Plain key access for the legacy layout
//!
//! # Design Decisions
//! - Locks are a create-revision-guarded transactional put of a key
//!   attached to a lease; the lease TTL bounds how long a crashed
//!   holder can keep the lock
//! - The lock value records the lease id so release can revoke the
//!   lease instead of leaving it to expire
//! - Chunk records are written one per request as the body streams in,
//!   and read back a bounded page at a time, so a blob is never held
//!   whole in memory and no single gRPC message approaches the
//!   transport's receive limit
//! - Each write lands under a fresh generation prefix
//!   `{key}/{generation}/` with the manifest at `{key}` swapped last,
//!   so a crash mid-write (first write or overwrite) leaves the
//!   manifest pointing at the previous intact generation
//! - Reads verify the reassembled byte count against the manifest and
//!   fail as corrupt rather than serving a truncated blob

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use etcd_client::{
    Certificate, Client, Compare, CompareOp, ConnectOptions, DeleteOptions, GetOptions, Identity,
    KvClient, PutOptions, SortOrder, SortTarget, Txn, TxnOp, TlsOptions,
};
use futures_util::StreamExt;
use tokio::time::Instant;

use crate::config::EtcdConfig;
use crate::store::{ByteStream, LockAttempt, LockHandle, StateStore, StatePayload, StoreError};

/// Upper bound on a single etcd record. Stays below etcd's default
/// 1.5 MiB request limit with headroom for the key and framing.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Chunk records fetched per range request on read. Two records per
/// page keeps each gRPC response well under tonic's 4 MiB decode limit.
const PAGE_LIMIT: i64 = 2;

/// Store client backed by an etcd cluster.
///
/// `Client` is cheaply cloneable and safe for concurrent use, so one
/// `EtcdStore` is shared by all in-flight requests.
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to the cluster described by `config`.
    pub async fn connect(config: &EtcdConfig) -> Result<Self, StoreError> {
        let mut options = ConnectOptions::new()
            .with_connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .with_timeout(Duration::from_secs(config.request_timeout_secs));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options = options.with_user(username, password);
        }

        if let Some(tls) = tls_options(config).await? {
            options = options.with_tls(tls);
        }

        let client = Client::connect(&config.endpoints, Some(options)).await?;
        tracing::info!(endpoints = ?config.endpoints, "connected to etcd cluster");
        Ok(Self { client })
    }
}

async fn tls_options(config: &EtcdConfig) -> Result<Option<TlsOptions>, StoreError> {
    let Some(ca_path) = &config.ca_cert else {
        return Ok(None);
    };

    let ca_pem = tokio::fs::read(ca_path)
        .await
        .map_err(|e| StoreError::Unavailable(format!("cannot read ca cert {}: {}", ca_path, e)))?;
    let mut tls = TlsOptions::new().ca_certificate(Certificate::from_pem(ca_pem));

    if let (Some(cert_path), Some(key_path)) = (&config.client_cert, &config.client_key) {
        let cert = tokio::fs::read(cert_path).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot read client cert {}: {}", cert_path, e))
        })?;
        let key = tokio::fs::read(key_path).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot read client key {}: {}", key_path, e))
        })?;
        tls = tls.identity(Identity::from_pem(cert, key));
    }

    Ok(Some(tls))
}

/// Chunk records for one write generation live under this prefix.
fn chunk_prefix(key: &str, generation: u64) -> String {
    format!("{}/{:08}/", key, generation)
}

/// Prefix covering the chunk records of every generation.
fn chunk_root(key: &str) -> String {
    format!("{}/", key)
}

/// Exclusive end of the range starting at `prefix`. Our prefixes end
/// in `/`, so bumping the final byte is always safe.
fn prefix_end(prefix: &str) -> Vec<u8> {
    let mut end = prefix.as_bytes().to_vec();
    if let Some(last) = end.last_mut() {
        *last += 1;
    }
    end
}

fn format_manifest(generation: u64, size: i64) -> String {
    format!("{:08}:{}", generation, size)
}

fn parse_manifest(value: &str) -> Option<(u64, i64)> {
    let (generation, size) = value.split_once(':')?;
    Some((generation.parse().ok()?, size.parse().ok()?))
}

/// Accumulates stream pieces and hands back full `CHUNK_SIZE` records
/// as soon as they fill, bounding memory to one chunk regardless of
/// blob size.
struct ChunkBuffer {
    buf: BytesMut,
}

impl ChunkBuffer {
    fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(CHUNK_SIZE),
        }
    }

    fn push(&mut self, piece: Bytes) -> Vec<Bytes> {
        self.buf.extend_from_slice(&piece);
        let mut full = Vec::new();
        while self.buf.len() >= CHUNK_SIZE {
            full.push(self.buf.split_to(CHUNK_SIZE).freeze());
        }
        full
    }

    fn finish(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.split().freeze())
        }
    }
}

/// Read cursor walking one generation's chunk records page by page.
struct PageCursor {
    kv: KvClient,
    next: Option<Vec<u8>>,
    end: Vec<u8>,
    expected: i64,
    received: i64,
    key: String,
}

async fn fetch_page(mut cursor: PageCursor) -> Result<Option<(Bytes, PageCursor)>, StoreError> {
    let Some(start) = cursor.next.take() else {
        return Ok(None);
    };

    let resp = cursor
        .kv
        .get(
            start,
            Some(
                GetOptions::new()
                    .with_range(cursor.end.clone())
                    .with_limit(PAGE_LIMIT)
                    .with_sort(SortTarget::Key, SortOrder::Ascend),
            ),
        )
        .await?;

    let mut page = BytesMut::new();
    for entry in resp.kvs() {
        page.extend_from_slice(entry.value());
    }
    cursor.received += page.len() as i64;

    if resp.more() {
        if let Some(last) = resp.kvs().last() {
            let mut next = last.key().to_vec();
            next.push(0);
            cursor.next = Some(next);
        }
    } else {
        verify_complete(cursor.received, cursor.expected, &cursor.key)?;
    }

    Ok(Some((page.freeze(), cursor)))
}

/// Final-page check that the reassembled bytes match the manifest.
fn verify_complete(received: i64, expected: i64, key: &str) -> Result<(), StoreError> {
    if received != expected {
        return Err(StoreError::Unavailable(format!(
            "corrupt chunk data at {}: manifest declares {} bytes, found {}",
            key, expected, received
        )));
    }
    Ok(())
}

#[async_trait]
impl StateStore for EtcdStore {
    async fn acquire_lock(
        &self,
        key: &str,
        lease_ttl: i64,
        timeout: Duration,
        retry_interval: Duration,
    ) -> Result<LockAttempt, StoreError> {
        let deadline = Instant::now() + timeout;
        let mut kv = self.client.kv_client();
        let mut leases = self.client.lease_client();

        loop {
            let lease = leases.grant(lease_ttl, None).await?;
            let txn = Txn::new()
                .when(vec![Compare::create_revision(key, CompareOp::Equal, 0)])
                .and_then(vec![TxnOp::put(
                    key,
                    lease.id().to_string(),
                    Some(PutOptions::new().with_lease(lease.id())),
                )]);

            let resp = kv.txn(txn).await?;
            if resp.succeeded() {
                return Ok(LockAttempt::Acquired(LockHandle::new(lease.id())));
            }

            // Lost the race; the lease is unused and would otherwise
            // linger until its TTL.
            let _ = leases.revoke(lease.id()).await;

            if Instant::now() + retry_interval >= deadline {
                return Ok(LockAttempt::AlreadyLocked);
            }
            tokio::time::sleep(retry_interval).await;
        }
    }

    async fn release_lock(&self, key: &str) -> Result<(), StoreError> {
        let mut kv = self.client.kv_client();
        let mut leases = self.client.lease_client();

        let resp = kv.get(key, None).await?;
        if let Some(entry) = resp.kvs().first() {
            if let Ok(lease_id) = entry.value_str().unwrap_or_default().parse::<i64>() {
                // Revoking the lease deletes the attached lock key; the
                // lease may already have expired, which is fine.
                let _ = leases.revoke(lease_id).await;
            }
        }

        kv.delete(key, None).await?;
        Ok(())
    }

    async fn put_chunked(
        &self,
        key: &str,
        mut data: ByteStream,
        size: i64,
    ) -> Result<(), StoreError> {
        let mut kv = self.client.kv_client();

        let current = kv.get(key, None).await?;
        let generation = current
            .kvs()
            .first()
            .and_then(|entry| parse_manifest(entry.value_str().unwrap_or_default()))
            .map(|(generation, _)| generation + 1)
            .unwrap_or(0);
        let prefix = chunk_prefix(key, generation);

        // A crashed writer may have left records under this generation
        // without ever swapping the manifest.
        kv.delete(
            prefix.clone(),
            Some(DeleteOptions::new().with_prefix()),
        )
        .await?;

        let mut chunks = ChunkBuffer::new();
        let mut index = 0u64;
        let mut written = 0i64;

        while let Some(piece) = data.next().await {
            for chunk in chunks.push(piece?) {
                written += chunk.len() as i64;
                kv.put(format!("{}{:08}", prefix, index), chunk.to_vec(), None)
                    .await?;
                index += 1;
            }
        }
        if let Some(rest) = chunks.finish() {
            written += rest.len() as i64;
            kv.put(format!("{}{:08}", prefix, index), rest.to_vec(), None)
                .await?;
        }

        if written != size {
            // The manifest still points at the previous generation, so
            // nothing partial becomes visible; drop what we wrote.
            kv.delete(prefix, Some(DeleteOptions::new().with_prefix()))
                .await?;
            return Err(StoreError::Stream(format!(
                "declared size {} but received {} bytes",
                size, written
            )));
        }

        // Swap the manifest, then drop every older generation.
        kv.put(key, format_manifest(generation, size), None).await?;
        kv.delete(
            chunk_root(key),
            Some(DeleteOptions::new().with_range(prefix.into_bytes())),
        )
        .await?;
        Ok(())
    }

    async fn get_chunked(&self, key: &str) -> Result<Option<StatePayload>, StoreError> {
        let mut kv = self.client.kv_client();

        let manifest = kv.get(key, None).await?;
        let Some(entry) = manifest.kvs().first() else {
            return Ok(None);
        };
        let (generation, size) = parse_manifest(entry.value_str().unwrap_or_default())
            .ok_or_else(|| StoreError::Unavailable(format!("corrupt manifest at {}", key)))?;

        let prefix = chunk_prefix(key, generation);
        let cursor = PageCursor {
            kv: self.client.kv_client(),
            next: Some(prefix.clone().into_bytes()),
            end: prefix_end(&prefix),
            expected: size,
            received: 0,
            key: key.to_string(),
        };

        Ok(Some(StatePayload {
            size,
            data: Box::pin(futures_util::stream::try_unfold(cursor, fetch_page)),
        }))
    }

    async fn delete_chunked(&self, key: &str) -> Result<(), StoreError> {
        let mut kv = self.client.kv_client();
        kv.delete(key, None).await?;
        kv.delete(
            chunk_root(key),
            Some(DeleteOptions::new().with_prefix()),
        )
        .await?;
        Ok(())
    }

    async fn get_plain(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut kv = self.client.kv_client();
        let resp = kv.get(key, None).await?;
        Ok(resp
            .kvs()
            .first()
            .map(|entry| Bytes::copy_from_slice(entry.value())))
    }

    async fn delete_plain(&self, key: &str) -> Result<(), StoreError> {
        let mut kv = self.client.kv_client();
        kv.delete(key, None).await?;
        Ok(())
    }

    async fn member_count(&self) -> Result<usize, StoreError> {
        let mut cluster = self.client.cluster_client();
        let resp = cluster.member_list().await?;
        Ok(resp.members().len())
    }
}
