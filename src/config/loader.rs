//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::Config;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading the configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing the configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_applied() {
        let file = write_config(
            r#"
            [etcd]
            endpoints = ["127.0.0.1:2379"]
            "#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.server.port, 14443);
        assert_eq!(config.server.address, "0.0.0.0");
        assert_eq!(config.lock.timeout_secs, 30);
        assert_eq!(config.lock.retry_interval_ms, 500);
        assert_eq!(config.etcd.connection_timeout_secs, 120);
        assert!(!config.legacy.read);
        assert!(!config.server.remote_termination);
    }

    #[test]
    fn test_empty_config_fails_validation() {
        let file = write_config("");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_full_config_parses() {
        let file = write_config(
            r#"
            [etcd]
            endpoints = ["10.0.0.1:2379", "10.0.0.2:2379"]
            ca_cert = "/etc/gateway/ca.pem"
            client_cert = "/etc/gateway/client.pem"
            client_key = "/etc/gateway/client-key.pem"

            [lock]
            timeout_secs = 5
            retry_interval_ms = 250

            [server]
            address = "127.0.0.1"
            port = 8080
            remote_termination = true

            [server.tls]
            cert_path = "/etc/gateway/server.pem"
            key_path = "/etc/gateway/server-key.pem"

            [legacy]
            read = true
            clear = true
            add_slash = true
            "#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.etcd.endpoints.len(), 2);
        assert_eq!(config.lock.timeout_secs, 5);
        assert!(config.server.remote_termination);
        assert!(config.server.tls.is_some());
        assert!(config.legacy.add_slash);
    }
}
