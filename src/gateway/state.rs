//! State read/write/delete with legacy-layout compatibility.

use std::sync::Arc;

use crate::config::LegacyConfig;
use crate::error::GatewayError;
use crate::gateway::keys;
use crate::store::{ByteStream, StatePayload, StateStore};

/// Namespace-scoped state operations over the shared store client.
///
/// The gateway adds no serialization of its own: concurrent operations
/// on the same namespace are governed by the store's consistency model,
/// and mutual exclusion across a plan/apply cycle is the caller's job
/// via the lock routes.
pub struct StateGateway {
    store: Arc<dyn StateStore>,
    legacy: LegacyConfig,
}

impl StateGateway {
    pub fn new(store: Arc<dyn StateStore>, legacy: LegacyConfig) -> Self {
        Self { store, legacy }
    }

    /// Store a state blob. Returns the derived state key.
    ///
    /// When legacy clearing is enabled, a successful write also removes
    /// the namespace's pre-chunking record. That cleanup is advisory:
    /// its failures are logged and never fail the write.
    pub async fn put(
        &self,
        namespace: &str,
        data: ByteStream,
        size: i64,
    ) -> Result<String, GatewayError> {
        let key = keys::state_key(validate(namespace)?);
        self.store.put_chunked(&key, data, size).await?;

        if self.legacy.clear {
            self.clear_legacy(namespace).await;
        }

        Ok(key)
    }

    /// Fetch the state blob for a namespace.
    ///
    /// Falls back to the legacy layout when the chunked record is absent
    /// and legacy reads are enabled.
    pub async fn get(&self, namespace: &str) -> Result<StatePayload, GatewayError> {
        let key = keys::state_key(validate(namespace)?);

        if let Some(payload) = self.store.get_chunked(&key).await? {
            return Ok(payload);
        }

        if self.legacy.read {
            let legacy_key = keys::legacy_key(namespace, self.legacy.add_slash);
            if let Some(value) = self.store.get_plain(&legacy_key).await? {
                tracing::info!(key = %legacy_key, "reading from legacy state");
                return Ok(StatePayload::from_bytes(value));
            }
        }

        Err(GatewayError::NotFound)
    }

    /// Delete the state blob. Returns the derived state key.
    ///
    /// The legacy record is left alone; deletion was never part of the
    /// legacy compatibility contract.
    pub async fn delete(&self, namespace: &str) -> Result<String, GatewayError> {
        let key = keys::state_key(validate(namespace)?);
        self.store.delete_chunked(&key).await?;
        Ok(key)
    }

    async fn clear_legacy(&self, namespace: &str) {
        let legacy_key = keys::legacy_key(namespace, self.legacy.add_slash);

        let existing = match self.store.get_plain(&legacy_key).await {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(key = %legacy_key, error = %err, "could not check for legacy state");
                return;
            }
        };
        if existing.is_none() {
            return;
        }

        tracing::info!(key = %legacy_key, "clearing legacy state");
        if let Err(err) = self.store.delete_plain(&legacy_key).await {
            tracing::warn!(key = %legacy_key, error = %err, "could not clear legacy state");
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bytes::Bytes;
    use futures_util::StreamExt;

    fn stream_of(data: &'static [u8]) -> ByteStream {
        Box::pin(futures_util::stream::once(async move {
            Ok(Bytes::from_static(data))
        }))
    }

    async fn collect(payload: StatePayload) -> Vec<u8> {
        let mut out = Vec::new();
        let mut data = payload.data;
        while let Some(chunk) = data.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    fn gateway(legacy: LegacyConfig) -> (Arc<MemoryStore>, StateGateway) {
        let store = Arc::new(MemoryStore::new());
        let gw = StateGateway::new(store.clone(), legacy);
        (store, gw)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_, gw) = gateway(LegacyConfig::default());

        let key = gw.put("proj1", stream_of(b"{\"v\":1}"), 7).await.unwrap();
        assert_eq!(key, "proj1/state");

        let payload = gw.get("proj1").await.unwrap();
        assert_eq!(payload.size, 7);
        assert_eq!(collect(payload).await, b"{\"v\":1}");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_, gw) = gateway(LegacyConfig::default());
        assert!(matches!(
            gw.get("proj1").await,
            Err(GatewayError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_namespace_makes_no_store_call() {
        let (store, gw) = gateway(LegacyConfig::default());
        assert!(matches!(
            gw.get("").await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_read_fallback() {
        let legacy = LegacyConfig {
            read: true,
            clear: false,
            add_slash: false,
        };
        let (store, gw) = gateway(legacy);
        store.seed_plain("proj1default", b"old-state");

        let payload = gw.get("proj1").await.unwrap();
        assert_eq!(collect(payload).await, b"old-state");
    }

    #[tokio::test]
    async fn test_legacy_read_disabled_stays_not_found() {
        let (store, gw) = gateway(LegacyConfig::default());
        store.seed_plain("proj1default", b"old-state");

        assert!(matches!(
            gw.get("proj1").await,
            Err(GatewayError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_put_clears_legacy_when_enabled() {
        let legacy = LegacyConfig {
            read: false,
            clear: true,
            add_slash: true,
        };
        let (store, gw) = gateway(legacy);
        store.seed_plain("proj1/default", b"old-state");

        gw.put("proj1", stream_of(b"new"), 3).await.unwrap();
        assert!(!store.has_plain("proj1/default"));
    }

    #[tokio::test]
    async fn test_legacy_clear_failure_does_not_fail_put() {
        let legacy = LegacyConfig {
            read: false,
            clear: true,
            add_slash: false,
        };
        let (store, gw) = gateway(legacy);
        store.seed_plain("proj1default", b"old-state");
        store.fail_op("delete_plain");

        // The cleanup delete fails but the primary write still succeeds.
        let key = gw.put("proj1", stream_of(b"new"), 3).await.unwrap();
        assert_eq!(key, "proj1/state");
        assert!(store.has_chunked("proj1/state"));
        assert!(store.has_plain("proj1default"));
    }

    #[tokio::test]
    async fn test_legacy_check_failure_does_not_fail_put() {
        let legacy = LegacyConfig {
            read: false,
            clear: true,
            add_slash: false,
        };
        let (store, gw) = gateway(legacy);
        store.fail_op("get_plain");

        let key = gw.put("proj1", stream_of(b"new"), 3).await.unwrap();
        assert_eq!(key, "proj1/state");
    }

    #[tokio::test]
    async fn test_delete_leaves_legacy_key() {
        let legacy = LegacyConfig {
            read: true,
            clear: true,
            add_slash: false,
        };
        let (store, gw) = gateway(legacy);
        gw.put("proj1", stream_of(b"new"), 3).await.unwrap();
        store.seed_plain("proj1default", b"old-state");

        let key = gw.delete("proj1").await.unwrap();
        assert_eq!(key, "proj1/state");
        assert!(!store.has_chunked("proj1/state"));
        // Deletion never touches the legacy layout.
        assert!(store.has_plain("proj1default"));
    }
}
