//! idgate Egress
//!
//! Outbound side of the client core:
//! - OAuth2 client-credentials token cache (per tenant)
//! - Shared token-bucket rate limiter with Retry-After handling
//! - Request executor with bounded retries and backoff
//! - Lazy traversal of `_links.next` pagination

pub mod client;
pub mod executor;
pub mod pagination;
pub mod rate_limit;
pub mod retry_after;
pub mod token;

pub use client::{HttpClientConfig, create_client};
pub use executor::{RawResponse, RequestExecutor, RetryPolicy};
pub use pagination::PageStream;
pub use rate_limit::RateLimiter;
pub use retry_after::{MAX_RETRY_AFTER, parse_retry_after};
pub use token::{Token, TokenCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    /// Client-credentials exchange failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Provider returned error: {status_code} - {message}")]
    ProviderError {
        status_code: u16,
        message: String,
        headers: Vec<(String, String)>,
    },

    /// Response body is not the JSON the caller expected
    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl From<EgressError> for idgate_core::Error {
    fn from(e: EgressError) -> Self {
        match e {
            EgressError::HttpError(e) => idgate_core::Error::Transport(e.to_string()),
            EgressError::Timeout(secs) => {
                idgate_core::Error::Transport(format!("Request timeout after {}s", secs))
            }
            EgressError::Auth(message) => idgate_core::Error::Auth(message),
            EgressError::ProviderError {
                status_code,
                message,
                headers,
            } => idgate_core::Error::RemoteApi {
                status: status_code,
                body: message,
                headers,
            },
            EgressError::ParseError(e) => idgate_core::Error::Serialization(e),
            EgressError::ConfigError(message) => idgate_core::Error::Config(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, EgressError>;
