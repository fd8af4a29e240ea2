//! Shared token-bucket rate limiter
//!
//! A single bucket gates every outbound request regardless of tenant, which
//! keeps aggregate throughput under the remote API's global quota. The
//! bucket starts full, holds at most `capacity` tokens and refills
//! continuously at `capacity` tokens per second.

use idgate_observability::ClientMetrics;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::retry_after::{MAX_RETRY_AFTER, parse_retry_after};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refilled(self, now: Instant, capacity: f64) -> Bucket {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        Bucket {
            tokens: (self.tokens + elapsed * capacity).min(capacity),
            last_refill: now,
        }
    }
}

/// Process-wide rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    bucket: Mutex<Bucket>,
    metrics: Option<ClientMetrics>,
}

impl RateLimiter {
    /// Limiter allowing `requests_per_second` with bursts of the same size
    pub fn new(requests_per_second: u32) -> Self {
        let capacity = f64::from(requests_per_second.max(1));
        Self {
            capacity,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    /// Take one token, waiting for it to accrue if the bucket is empty.
    ///
    /// The lock is held across the wait so callers are served in arrival
    /// order. Returns how long the caller waited.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        let mut bucket = self.bucket.lock().await;

        let mut next = bucket.refilled(Instant::now(), self.capacity);
        if next.tokens < 1.0 {
            let wait = Duration::from_secs_f64((1.0 - next.tokens) / self.capacity);
            *bucket = next;
            debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting for token");
            tokio::time::sleep(wait).await;
            next = bucket.refilled(Instant::now(), self.capacity);
        }

        *bucket = Bucket {
            tokens: (next.tokens - 1.0).max(0.0),
            last_refill: next.last_refill,
        };
        drop(bucket);

        let waited = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_rate_limit_wait(waited.as_secs_f64());
        }
        waited
    }

    /// Honor a server `Retry-After` hint.
    ///
    /// Sleeps for the hinted duration and returns `true`. Unparsable,
    /// negative or past values, and waits longer than [`MAX_RETRY_AFTER`],
    /// return `false` immediately.
    pub async fn handle_retry_after(&self, header_value: &str) -> bool {
        let Some(wait) = parse_retry_after(header_value) else {
            debug!(header_value, "Ignoring unparsable Retry-After");
            return false;
        };

        if wait > MAX_RETRY_AFTER {
            warn!(
                requested_secs = wait.as_secs(),
                max_secs = MAX_RETRY_AFTER.as_secs(),
                "Retry-After exceeds ceiling, ignoring"
            );
            return false;
        }

        debug!(wait_ms = wait.as_millis() as u64, "Honoring Retry-After");
        tokio::time::sleep(wait).await;
        true
    }

    /// Tokens currently available, refill included
    pub async fn available_tokens(&self) -> f64 {
        let bucket = self.bucket.lock().await;
        bucket.refilled(Instant::now(), self.capacity).tokens
    }
}
