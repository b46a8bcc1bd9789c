//! Client Configuration
//!
//! Defaults suit a local demo; `from_env` overrides them from `RGS_*`
//! variables so the same binary can point at a live RGS.

use std::time::Duration;

use crate::core::money::{to_fixed, Amount, MONETARY_SCALE};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default demo balance (10,000.00).
pub const DEFAULT_DEMO_BALANCE: Amount = 10_000 * MONETARY_SCALE;

/// Retry behaviour for transient (network) failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request (including the first attempt).
    pub max_attempts: usize,
    /// Initial backoff delay after the first retryable failure.
    pub initial_backoff: Duration,
    /// Maximum backoff delay between attempts.
    pub max_backoff: Duration,
    /// Whether mutating requests that carry an idempotency key may be retried.
    /// Mutations without a key are never retried.
    pub retry_keyed_mutations: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_keyed_mutations: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// Attempts allowed for a request of the given kind.
    pub fn attempts_for(&self, mutating: bool, keyed: bool) -> usize {
        if !mutating || (keyed && self.retry_keyed_mutations) {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Delay after `backoff`, doubling up to the cap.
    pub fn next_backoff(&self, backoff: Duration) -> Duration {
        std::cmp::min(backoff.saturating_mul(2), self.max_backoff)
    }
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// RGS base URL. `None` plays against the in-process demo RGS.
    pub base_url: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retry behaviour.
    pub retry: RetryPolicy,
    /// Fall back to a demo session when session creation fails.
    pub demo_fallback: bool,
    /// Starting balance of demo sessions.
    pub demo_balance: Amount,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            demo_fallback: true,
            demo_balance: DEFAULT_DEMO_BALANCE,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("RGS_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            request_timeout: env_parse::<u64>("RGS_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            retry: RetryPolicy {
                max_attempts: env_parse("RGS_MAX_ATTEMPTS").unwrap_or(defaults.retry.max_attempts),
                ..defaults.retry
            },
            demo_fallback: std::env::var("RGS_DEMO_FALLBACK")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.demo_fallback),
            demo_balance: env_parse::<f64>("RGS_DEMO_BALANCE")
                .and_then(|v| to_fixed(v).ok())
                .filter(|v| *v >= 0)
                .unwrap_or(defaults.demo_balance),
        }
    }

    /// Builder-style base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builder-style retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder-style request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
