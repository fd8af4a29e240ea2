//! Error types for idgate Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid settings. Fatal at startup, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tenant '{input}' not found. Available tenants: {}", .available.join(", "))]
    TenantNotFound {
        input: String,
        available: Vec<String>,
    },

    /// The client-credentials exchange failed.
    #[error("Token request failed: {0}")]
    Auth(String),

    /// Timeout or connection failure that outlived the retry budget.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx final response from the remote API.
    #[error("Remote API returned HTTP {status}: {body}")]
    RemoteApi {
        status: u16,
        body: String,
        headers: Vec<(String, String)>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status of a remote failure, if this error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller can fix this by changing its input
    pub fn is_caller_correctable(&self) -> bool {
        matches!(self, Error::TenantNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
