//! Client construction for OpenAI-compatible provider endpoints.

use crate::error::{ProspektError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for provider requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connection details for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the API (e.g. `https://api.openai.com/v1`).
    pub api_base: String,
    /// API key, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Create a client for an OpenAI-compatible endpoint with an explicit timeout.
///
/// Requests never block indefinitely: the underlying HTTP client enforces
/// `options.timeout` on every call.
pub fn create_client(options: &ClientOptions) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(options.timeout)
        .build()
        .map_err(|e| ProspektError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::new().with_api_base(&options.api_base);
    if let Some(key) = &options.api_key {
        config = config.with_api_key(key);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Read a credential from the named environment variable, treating empty values as absent.
pub fn read_credential(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_credential_ignores_missing_vars() {
        assert!(read_credential("PROSPEKT_TEST_SURELY_UNSET_VAR").is_none());
    }

    #[test]
    fn test_create_client_without_key() {
        let options = ClientOptions::new("http://localhost:8080/v1", None)
            .with_timeout(Duration::from_secs(5));
        assert!(create_client(&options).is_ok());
    }
}
