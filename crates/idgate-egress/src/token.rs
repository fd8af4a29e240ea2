//! OAuth2 client-credentials token cache
//!
//! One [`TokenCache`] per tenant. The cached token moves through
//! `NoToken -> Valid -> Expiring -> NoToken`: it is exchanged on first use,
//! reused while valid, and exchanged again once it is within
//! [`EXPIRY_BUFFER`] of its expiry or after [`TokenCache::invalidate`].
//!
//! Concurrent callers may both see an expired token and both refresh it.
//! That costs one extra exchange and is tolerated; the slot is always
//! replaced as a whole, never patched.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use idgate_core::TenantConfig;
use idgate_observability::ClientMetrics;
use reqwest::{Client, header};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{EgressError, Result};

/// Tokens are treated as expired this long before their real expiry
pub const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

/// A cached bearer token
#[derive(Clone)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Instant,
    pub scope: Option<String>,
}

impl Token {
    /// Token issued at `issued_at`, valid for `expires_in`
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        issued_at: Instant,
        expires_in: Duration,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: token_type.into(),
            expires_at: issued_at + expires_in,
            scope,
        }
    }

    /// Expired once `now` reaches `expires_at - EXPIRY_BUFFER`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now + EXPIRY_BUFFER >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Per-tenant token cache
pub struct TokenCache {
    client: Client,
    tenant_name: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    slot: RwLock<Option<Token>>,
    metrics: Option<ClientMetrics>,
}

impl TokenCache {
    /// Cache for `tenant`, exchanging at `{auth_base_url}/{tenant_id}/as/token`
    pub fn new(client: Client, auth_base_url: &str, tenant: &TenantConfig) -> Self {
        Self {
            client,
            tenant_name: tenant.name.clone(),
            token_url: format!("{}/{}/as/token", auth_base_url.trim_end_matches('/'), tenant.id),
            client_id: tenant.client_id.clone(),
            client_secret: tenant.client_secret.clone(),
            slot: RwLock::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tenant_name(&self) -> &str {
        &self.tenant_name
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Current access token, exchanging credentials if needed.
    ///
    /// # Errors
    /// - `EgressError::Auth` if the exchange fails or returns a non-2xx status
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.slot.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *self.slot.write().await = Some(token);
        Ok(access_token)
    }

    /// `Bearer <token>`
    pub async fn auth_header(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.get_token().await?))
    }

    /// Drop the cached token so the next call re-authenticates
    pub async fn invalidate(&self) {
        if self.slot.write().await.take().is_some() {
            info!(tenant = %self.tenant_name, "Invalidated cached token");
        }
    }

    /// Snapshot of the cached token, if any
    pub async fn current(&self) -> Option<Token> {
        self.slot.read().await.clone()
    }

    async fn exchange(&self) -> Result<Token> {
        debug!(tenant = %self.tenant_name, url = %self.token_url, "Requesting access token");

        let credentials =
            BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let form = serde_urlencoded::to_string([("grant_type", "client_credentials")])
            .map_err(|e| EgressError::Auth(format!("Failed to encode token request: {}", e)))?;

        let issued_at = Instant::now();
        let response = self
            .client
            .post(&self.token_url)
            .header(header::AUTHORIZATION, format!("Basic {}", credentials))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::ACCEPT, "application/json")
            .body(form)
            .send()
            .await
            .map_err(|e| EgressError::Auth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EgressError::Auth(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(
                tenant = %self.tenant_name,
                status = status.as_u16(),
                "Token exchange rejected"
            );
            return Err(EgressError::Auth(format!(
                "Token request for '{}' failed: {}",
                self.tenant_name, detail
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| EgressError::Auth(format!("Invalid token response: {}", e)))?;

        let expires_in = parsed
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_EXPIRES_IN);

        if let Some(metrics) = &self.metrics {
            metrics.record_token_refresh(&self.tenant_name);
        }
        info!(
            tenant = %self.tenant_name,
            expires_in_secs = expires_in.as_secs(),
            "Obtained access token"
        );

        Ok(Token::new(
            parsed.access_token,
            parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            issued_at,
            expires_in,
            parsed.scope,
        ))
    }
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("tenant_name", &self.tenant_name)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_window() {
        let issued = Instant::now();
        let token = Token::new("abc", "Bearer", issued, Duration::from_secs(3600), None);

        assert!(!token.is_expired_at(issued));
        assert!(!token.is_expired_at(issued + Duration::from_secs(3000)));
        assert!(!token.is_expired_at(issued + Duration::from_secs(3539)));
        assert!(token.is_expired_at(issued + Duration::from_secs(3540)));
        assert!(token.is_expired_at(issued + Duration::from_secs(3541)));
    }

    #[test]
    fn test_short_lived_token_is_immediately_expired() {
        let issued = Instant::now();
        let token = Token::new("abc", "Bearer", issued, Duration::from_secs(30), None);
        assert!(token.is_expired_at(issued));
    }

    #[test]
    fn test_debug_redacts_token() {
        let token = Token::new("super-secret", "Bearer", Instant::now(), DEFAULT_EXPIRES_IN, None);
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_token_url() {
        let tenant = TenantConfig::new("Production", "env-1", "cid", "secret");
        let cache = TokenCache::new(Client::new(), "https://auth.example.com/", &tenant);
        assert_eq!(cache.token_url(), "https://auth.example.com/env-1/as/token");
        assert!(cache.current().await.is_none());
        assert!(!format!("{:?}", cache).contains("secret\""));
    }
}
