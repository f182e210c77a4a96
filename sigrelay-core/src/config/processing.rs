use std::time::Duration;

/// Backoff parameters for failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts allowed before an event is `permanently_failed`.
    pub max_retries: i32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// When false every retry waits `base_delay` (capped by `max_delay`).
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            exponential: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    pub retry: RetryPolicy,
    /// Period of the recovery sweep over due and stale rows.
    pub sweep_interval: Duration,
    /// A `processing` row untouched for this long is assumed abandoned.
    pub stale_processing: Duration,
    pub max_concurrent_attempts: usize,
    /// Enforce `X-Signature` for tenants with a webhook secret.
    pub verify_signatures: bool,
    pub remote_timeout: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            sweep_interval: Duration::from_secs(10),
            stale_processing: Duration::from_secs(300),
            max_concurrent_attempts: 16,
            verify_signatures: true,
            remote_timeout: Duration::from_secs(30),
        }
    }
}
