//! Client metrics with Prometheus
//!
//! Tracks outbound traffic per tenant:
//! - Request counts by tenant, method and final status
//! - Retries by tenant and reason
//! - Token refreshes per tenant
//! - Request latency (whole logical call, retries included)
//! - Time spent waiting on the shared rate limiter

use prometheus::{CounterVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;

/// Metrics collector for the client core
#[derive(Clone)]
pub struct ClientMetrics {
    registry: Arc<Registry>,

    /// Completed logical requests
    pub requests_total: CounterVec,
    /// Retry attempts
    pub retries_total: CounterVec,
    /// Client-credentials exchanges
    pub token_refreshes_total: CounterVec,
    /// Logical request duration
    pub request_duration_seconds: HistogramVec,
    /// Rate limiter wait per acquire
    pub rate_limit_wait_seconds: Histogram,
}

impl ClientMetrics {
    /// Create a collector with its own registry
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create a collector registered into an existing registry
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new("idgate_requests_total", "Total number of API requests"),
            &["tenant", "method", "status"],
        )?;

        let retries_total = CounterVec::new(
            Opts::new("idgate_retries_total", "Total number of retried attempts"),
            &["tenant", "reason"],
        )?;

        let token_refreshes_total = CounterVec::new(
            Opts::new(
                "idgate_token_refreshes_total",
                "Total number of access token exchanges",
            ),
            &["tenant"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "idgate_request_duration_seconds",
                "API request duration in seconds, retries included",
            )
            .buckets(vec![
                0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ]),
            &["tenant", "method"],
        )?;

        let rate_limit_wait_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "idgate_rate_limit_wait_seconds",
                "Time spent waiting for a rate limiter token",
            )
            .buckets(vec![0.0, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(token_refreshes_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;
        registry.register(Box::new(rate_limit_wait_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            retries_total,
            token_refreshes_total,
            request_duration_seconds,
            rate_limit_wait_seconds,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a completed logical request.
    ///
    /// `status` is the final HTTP status, or `transport_error` when no
    /// response was received.
    pub fn record_request(&self, tenant: &str, method: &str, status: &str, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[tenant, method, status])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[tenant, method])
            .observe(duration_secs);
    }

    /// Record a retry and why it happened (`status_503`, `auth_refresh`, `transport`)
    pub fn record_retry(&self, tenant: &str, reason: &str) {
        self.retries_total.with_label_values(&[tenant, reason]).inc();
    }

    pub fn record_token_refresh(&self, tenant: &str) {
        self.token_refreshes_total.with_label_values(&[tenant]).inc();
    }

    pub fn record_rate_limit_wait(&self, wait_secs: f64) {
        self.rate_limit_wait_seconds.observe(wait_secs);
    }

    /// Encode every metric in the text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientMetrics").finish_non_exhaustive()
    }
}
