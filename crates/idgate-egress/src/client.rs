//! Shared HTTP client utilities

use crate::{EgressError, Result};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Per-attempt request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 32,
            user_agent: user_agent(),
        }
    }
}

impl HttpClientConfig {
    /// Default settings with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout_secs: timeout.as_secs().max(1),
            ..Default::default()
        }
    }
}

/// `idgate/<version>`, sent on every request
pub fn user_agent() -> String {
    format!("idgate/{}", env!("CARGO_PKG_VERSION"))
}

/// Create a configured HTTP client with connection pooling.
///
/// One client is shared by every tenant's executor and token cache.
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // Expire idle connections before the remote side closes them
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(&config.user_agent)
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| EgressError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.pool_max_idle_per_host, 32);
        assert!(config.user_agent.starts_with("idgate/"));
    }

    #[test]
    fn test_with_timeout() {
        let config = HttpClientConfig::with_timeout(Duration::from_secs(120));
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.connect_timeout_secs, 10);
    }

    #[test]
    fn test_create_client() {
        let client = create_client(&HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_error_display_formatting() {
        let err = EgressError::ConfigError("bad config".to_string());
        assert!(err.to_string().contains("Invalid configuration"));

        let err = EgressError::Timeout(30);
        assert_eq!(err.to_string(), "Request timeout after 30s");

        let err = EgressError::ProviderError {
            status_code: 500,
            message: "Internal error".to_string(),
            headers: vec![],
        };
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_conversion_into_core_error() {
        let core: idgate_core::Error = EgressError::Auth("invalid_client".to_string()).into();
        assert!(matches!(core, idgate_core::Error::Auth(_)));

        let core: idgate_core::Error = EgressError::ProviderError {
            status_code: 404,
            message: "{}".to_string(),
            headers: vec![("x-request-id".to_string(), "r1".to_string())],
        }
        .into();
        assert_eq!(core.status(), Some(404));

        let core: idgate_core::Error = EgressError::Timeout(5).into();
        assert!(matches!(core, idgate_core::Error::Transport(_)));

        let malformed = serde_json::from_str::<serde_json::Value>("{\"id\": ").unwrap_err();
        let core: idgate_core::Error = EgressError::from(malformed).into();
        assert!(matches!(core, idgate_core::Error::Serialization(_)));
    }
}
