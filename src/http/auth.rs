//! HTTP basic authentication.
//!
//! Credential lists live in an external TOML file mapping user names to
//! passwords. When a file is configured, the middleware gates every
//! route, including `/health` and `/termination`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("error reading the basic auth file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing the basic auth file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// User → password credential list.
#[derive(Debug, Clone)]
pub struct BasicAccounts {
    accounts: HashMap<String, String>,
}

impl BasicAccounts {
    /// Load the credential file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path)?;
        let accounts: HashMap<String, String> = toml::from_str(&content)?;
        Ok(Self { accounts })
    }

    pub fn from_map(accounts: HashMap<String, String>) -> Self {
        Self { accounts }
    }

    fn verify(&self, user: &str, password: &str) -> bool {
        self.accounts.get(user).map(String::as_str) == Some(password)
    }
}

/// Middleware rejecting requests without valid basic-auth credentials.
pub async fn basic_auth_middleware(
    State(accounts): State<Arc<BasicAccounts>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| BASE64.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .and_then(|credentials| {
            credentials
                .split_once(':')
                .map(|(user, password)| accounts.verify(user, password))
        })
        .unwrap_or(false);

    if authorized {
        return next.run(request).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"state-gateway\"")],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_credentials() {
        let mut map = HashMap::new();
        map.insert("terraform".to_string(), "hunter2".to_string());
        let accounts = BasicAccounts::from_map(map);

        assert!(accounts.verify("terraform", "hunter2"));
        assert!(!accounts.verify("terraform", "wrong"));
        assert!(!accounts.verify("unknown", "hunter2"));
    }

    #[test]
    fn test_load_credential_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "terraform = \"hunter2\"").unwrap();

        let accounts = BasicAccounts::load(file.path()).unwrap();
        assert!(accounts.verify("terraform", "hunter2"));
    }
}
