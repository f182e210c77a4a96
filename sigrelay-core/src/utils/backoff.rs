use crate::config::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Upper bound of the multiplicative jitter.
pub const MAX_JITTER: f64 = 0.1;

/// Delay before retry number `retry_count` (1 for the first retry).
///
/// `min(max_delay, base_delay * 2^(retry_count - 1)) * (1 + jitter)` with
/// jitter drawn from `[0, 0.1)`. Without exponential growth the base delay
/// is used for every retry.
pub fn retry_delay(policy: &RetryPolicy, retry_count: i32) -> Duration {
    let jitter = rand::rng().random_range(0.0..MAX_JITTER);
    retry_delay_with_jitter(policy, retry_count, jitter)
}

pub fn retry_delay_with_jitter(policy: &RetryPolicy, retry_count: i32, jitter: f64) -> Duration {
    let base = policy.base_delay.as_secs_f64();
    let cap = policy.max_delay.as_secs_f64();
    let uncapped = if policy.exponential {
        let exponent = retry_count.saturating_sub(1).clamp(0, 62);
        base * 2f64.powi(exponent)
    } else {
        base
    };
    let delay = uncapped.min(cap) * (1.0 + jitter.clamp(0.0, MAX_JITTER));
    Duration::try_from_secs_f64(delay).unwrap_or(policy.max_delay)
}
