//! Per-tenant request executor with bounded retries
//!
//! Every attempt takes a rate-limiter token and a bearer token before it is
//! sent. Attempts are numbered `0..=max_retries`:
//! - 2xx returns immediately
//! - 408/429/500/502/503/504 retry while attempts remain
//! - 401/403 retry once, on attempt 0 only, after invalidating the token
//! - anything else is returned as-is
//!
//! The delay before a retry is the server's `Retry-After` when the rate
//! limiter accepts it, otherwise exponential backoff with jitter. Transport
//! failures retry with the same backoff and surface only once the budget
//! is spent. A status failure that exhausts the budget returns the last
//! response instead of an error.

use bytes::Bytes;
use http::HeaderMap;
use idgate_observability::ClientMetrics;
use rand::Rng;
use reqwest::{Client, Method, header};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::client::user_agent;
use crate::rate_limit::RateLimiter;
use crate::token::TokenCache;
use crate::{EgressError, Result};

/// Query parameters, in the order they are sent
pub type QueryParams = Vec<(String, String)>;

/// Retry and backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the nominal delay added or removed at random
    pub jitter: f64,
    pub min_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
            min_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
    }

    pub fn is_auth_status(status: u16) -> bool {
        matches!(status, 401 | 403)
    }

    /// Whether a non-2xx `status` seen on `attempt` earns another attempt
    pub fn should_retry(&self, status: u16, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        Self::is_retryable_status(status) || (Self::is_auth_status(status) && attempt == 0)
    }

    /// `min(max_delay, base_delay * 2^attempt)`, before jitter
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Nominal delay with jitter applied, floored at `min_delay`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt).as_secs_f64();
        let spread = if self.jitter > 0.0 {
            nominal * self.jitter * rand::rng().random_range(-1.0..=1.0)
        } else {
            0.0
        };
        Duration::from_secs_f64((nominal + spread).max(self.min_delay.as_secs_f64()))
    }
}

/// A fully-read HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header value by case-insensitive name, if it is valid text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body as JSON; an empty body is `null`
    pub fn json(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Headers as name/value pairs, skipping values that aren't text
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect()
    }

    /// Turn a failed response into a provider error
    pub fn into_error(self) -> EgressError {
        EgressError::ProviderError {
            status_code: self.status,
            message: self.text(),
            headers: self.header_pairs(),
        }
    }
}

/// Executes calls for one tenant
pub struct RequestExecutor {
    client: Client,
    token_cache: TokenCache,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    timeout: Duration,
    user_agent: String,
    metrics: Option<ClientMetrics>,
}

impl RequestExecutor {
    pub fn new(
        client: Client,
        token_cache: TokenCache,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            token_cache,
            limiter,
            policy,
            timeout,
            user_agent: user_agent(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tenant_name(&self) -> &str {
        self.token_cache.tenant_name()
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Perform one logical call, retrying per the policy.
    ///
    /// # Errors
    /// - `EgressError::Auth` when the token exchange fails (not retried)
    /// - `EgressError::HttpError` / `EgressError::Timeout` when the last
    ///   attempt fails at the transport level
    /// - `EgressError::ConfigError` when the request cannot be built
    #[instrument(skip(self, params, body), fields(tenant = %self.tenant_name()))]
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<RawResponse> {
        let started = Instant::now();
        let url = with_query(url, params)?;
        let body = body.map(serde_json::to_vec).transpose()?;

        let mut attempt: u32 = 0;
        loop {
            match self.attempt(&method, &url, body.as_deref()).await {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, attempt, "Request succeeded");
                    self.record(&method, &response.status.to_string(), started);
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status;
                    if !self.policy.should_retry(status, attempt) {
                        warn!(status, attempt, "Request failed, not retrying");
                        self.record(&method, &status.to_string(), started);
                        return Ok(response);
                    }

                    let reason = if RetryPolicy::is_auth_status(status) {
                        self.token_cache.invalidate().await;
                        "auth_refresh".to_string()
                    } else {
                        format!("status_{}", status)
                    };
                    self.record_retry(&reason);

                    let honored = match response.header("retry-after") {
                        Some(value) => self.limiter.handle_retry_after(value).await,
                        None => false,
                    };
                    let delay = if honored {
                        Duration::ZERO
                    } else {
                        self.policy.backoff_delay(attempt)
                    };
                    warn!(
                        status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying request"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(AttemptError::Fatal(e)) => {
                    self.record(&method, "error", started);
                    return Err(e);
                }
                Err(AttemptError::Transport(e)) => {
                    if attempt >= self.policy.max_retries {
                        error!(attempt, error = %e, "Request failed after exhausting retries");
                        self.record(&method, "transport_error", started);
                        return Err(if e.is_timeout() {
                            EgressError::Timeout(self.timeout.as_secs())
                        } else {
                            EgressError::HttpError(e)
                        });
                    }

                    self.record_retry("transport");
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Transport error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    /// Send a single attempt with no retry.
    ///
    /// Still takes a rate-limiter token and a bearer token.
    pub async fn execute_once(
        &self,
        method: Method,
        url: &str,
        params: &[(String, String)],
    ) -> Result<RawResponse> {
        let started = Instant::now();
        let url = with_query(url, params)?;

        match self.attempt(&method, &url, None).await {
            Ok(response) => {
                self.record(&method, &response.status.to_string(), started);
                Ok(response)
            }
            Err(AttemptError::Fatal(e)) => {
                self.record(&method, "error", started);
                Err(e)
            }
            Err(AttemptError::Transport(e)) => {
                self.record(&method, "transport_error", started);
                Err(if e.is_timeout() {
                    EgressError::Timeout(self.timeout.as_secs())
                } else {
                    EgressError::HttpError(e)
                })
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        body: Option<&[u8]>,
    ) -> std::result::Result<RawResponse, AttemptError> {
        self.limiter.acquire().await;
        let token = self
            .token_cache
            .get_token()
            .await
            .map_err(AttemptError::Fatal)?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(self.timeout)
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token));
        if let Some(body) = body {
            request = request.body(body.to_vec());
        }

        let response = request.send().await.map_err(AttemptError::classify)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(AttemptError::classify)?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    fn record(&self, method: &Method, status: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(
                self.tenant_name(),
                method.as_str(),
                status,
                started.elapsed().as_secs_f64(),
            );
        }
    }

    fn record_retry(&self, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_retry(self.tenant_name(), reason);
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("tenant", &self.tenant_name())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

enum AttemptError {
    /// Retryable failure below HTTP (connect, timeout, reset)
    Transport(reqwest::Error),
    /// Never retried
    Fatal(EgressError),
}

impl AttemptError {
    fn classify(e: reqwest::Error) -> Self {
        if e.is_builder() {
            AttemptError::Fatal(EgressError::ConfigError(format!("Invalid request: {}", e)))
        } else {
            AttemptError::Transport(e)
        }
    }
}

/// Append `params` to `url` as a query string
pub fn with_query(url: &str, params: &[(String, String)]) -> Result<String> {
    if params.is_empty() {
        return Ok(url.to_string());
    }

    let query = serde_urlencoded::to_string(params)
        .map_err(|e| EgressError::ConfigError(format!("Invalid query parameters: {}", e)))?;
    let separator = if url.contains('?') { '&' } else { '?' };
    Ok(format!("{}{}{}", url, separator, query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_decisions() {
        let policy = RetryPolicy::new(2);
        assert!(policy.should_retry(503, 0));
        assert!(policy.should_retry(503, 1));
        assert!(!policy.should_retry(503, 2));
        assert!(policy.should_retry(401, 0));
        assert!(!policy.should_retry(401, 1));
        assert!(policy.should_retry(403, 0));
        assert!(!policy.should_retry(404, 0));
        assert!(!policy.should_retry(400, 0));

        let no_retries = RetryPolicy::new(0);
        assert!(!no_retries.should_retry(401, 0));
        assert!(!no_retries.should_retry(500, 0));
    }

    #[test]
    fn test_nominal_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.nominal_delay(0), Duration::from_secs(1));
        assert_eq!(policy.nominal_delay(1), Duration::from_secs(2));
        assert_eq!(policy.nominal_delay(3), Duration::from_secs(8));
        assert_eq!(policy.nominal_delay(5), Duration::from_secs(30));
        assert_eq!(policy.nominal_delay(40), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..200 {
            let delay = policy.backoff_delay(0).as_secs_f64();
            assert!((0.75..=1.25).contains(&delay), "delay {} out of range", delay);
            let capped = policy.backoff_delay(10).as_secs_f64();
            assert!((22.5..=37.5).contains(&capped), "delay {} out of range", capped);
        }
    }

    #[test]
    fn test_backoff_floor() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(10),
            ..Default::default()
        };
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
    }

    #[test]
    fn test_with_query() {
        let params = vec![
            ("limit".to_string(), "10".to_string()),
            ("filter".to_string(), "name eq \"a b\"".to_string()),
        ];
        assert_eq!(
            with_query("https://api.example.com/users", &params).unwrap(),
            "https://api.example.com/users?limit=10&filter=name+eq+%22a+b%22"
        );
        assert_eq!(
            with_query("https://api.example.com/users?expand=x", &params[..1]).unwrap(),
            "https://api.example.com/users?expand=x&limit=10"
        );
        assert_eq!(with_query("https://a/b", &[]).unwrap(), "https://a/b");
    }

    #[test]
    fn test_raw_response_helpers() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", "5".parse().unwrap());
        let response = RawResponse {
            status: 429,
            headers,
            body: Bytes::from_static(b"  "),
        };
        assert!(!response.is_success());
        assert_eq!(response.header("retry-after"), Some("5"));
        assert_eq!(response.json().unwrap(), Value::Null);

        match response.into_error() {
            EgressError::ProviderError {
                status_code,
                headers,
                ..
            } => {
                assert_eq!(status_code, 429);
                assert_eq!(headers, vec![("retry-after".to_string(), "5".to_string())]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
