//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML
//! config file; every field has a default so a minimal config works.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// etcd client settings.
    pub etcd: EtcdConfig,

    /// Lock acquisition settings.
    pub lock: LockConfig,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Legacy (pre-chunking) state layout compatibility.
    pub legacy: LegacyConfig,
}

/// etcd cluster connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EtcdConfig {
    /// Cluster endpoints (e.g., "127.0.0.1:2379"). At least one required.
    pub endpoints: Vec<String>,

    /// Connection establishment timeout.
    pub connection_timeout_secs: u64,

    /// Per-request timeout.
    pub request_timeout_secs: u64,

    /// Optional user auth.
    pub username: Option<String>,
    pub password: Option<String>,

    /// Optional TLS material (PEM paths). Client cert and key go together.
    pub ca_cert: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            connection_timeout_secs: 120,
            request_timeout_secs: 120,
            username: None,
            password: None,
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }
}

/// Lock acquisition behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long one acquisition request keeps retrying before reporting
    /// the lock as contested.
    pub timeout_secs: u64,

    /// Pause between acquisition attempts.
    pub retry_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_interval_ms: 500,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub address: String,

    /// Bind port.
    pub port: u16,

    /// Optional TLS termination.
    pub tls: Option<TlsConfig>,

    /// Optional path to a basic-auth credential file (user → password map).
    pub basic_auth: Option<String>,

    /// Whether `POST /termination` is routed at all. Off by default;
    /// the route grants remote callers the power to stop the process.
    pub remote_termination: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 14443,
            tls: None,
            basic_auth: None,
            remote_termination: false,
        }
    }
}

/// TLS certificate material for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Legacy state layout compatibility policy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LegacyConfig {
    /// Fall back to the legacy key when chunked state is absent.
    pub read: bool,

    /// Best-effort delete of the legacy key after a successful write.
    pub clear: bool,

    /// Legacy keys were laid out as `{namespace}/default` in some
    /// deployments and `{namespace}default` in others.
    pub add_slash: bool,
}
