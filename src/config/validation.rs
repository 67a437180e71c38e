//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check required fields (at least one etcd endpoint)
//! - Validate value ranges (timeouts > 0)
//! - Check paired fields (client cert and key go together)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the parsed config

use std::fmt;

use crate::config::schema::Config;

/// One failed validation check.
#[derive(Debug)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn error(field: &str, message: &str) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.etcd.endpoints.is_empty() {
        errors.push(error("etcd.endpoints", "no etcd endpoint specified"));
    }
    if config.etcd.endpoints.iter().any(|e| e.is_empty()) {
        errors.push(error("etcd.endpoints", "endpoint must not be empty"));
    }

    if config.lock.timeout_secs == 0 {
        errors.push(error("lock.timeout_secs", "must be greater than zero"));
    }
    if config.lock.retry_interval_ms == 0 {
        errors.push(error("lock.retry_interval_ms", "must be greater than zero"));
    }

    if config.etcd.client_cert.is_some() != config.etcd.client_key.is_some() {
        errors.push(error(
            "etcd.client_cert",
            "client_cert and client_key must be set together",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        let mut config = Config::default();
        config.etcd.endpoints = vec!["127.0.0.1:2379".to_string()];
        config
    }

    #[test]
    fn test_minimal_config_is_valid() {
        assert!(validate_config(&minimal()).is_ok());
    }

    #[test]
    fn test_missing_endpoints_rejected() {
        let config = Config::default();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "etcd.endpoints"));
    }

    #[test]
    fn test_unpaired_client_cert_rejected() {
        let mut config = minimal();
        config.etcd.client_cert = Some("cert.pem".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "etcd.client_cert"));
    }

    #[test]
    fn test_zero_lock_timeout_rejected() {
        let mut config = minimal();
        config.lock.timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "lock.timeout_secs"));
    }
}
