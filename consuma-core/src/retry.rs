//! Backoff policy for callback delivery retries.
//!
//! Shaped like `hook_common::retry::RetryPolicy`, but the interval formula
//! and jitter are ported from `original_source/src/app/callback.py`:
//! `delay = min(base * 2^(k-1), max_delay)` with ±25% uniform jitter.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_delay: Duration) -> Self {
        Self {
            base,
            max_delay,
            jitter_fraction: 0.25,
        }
    }

    /// The un-jittered delay before attempt `attempt + 1`, given `attempt`
    /// (1-indexed) just failed.
    fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled = self.base.saturating_mul(1u32.checked_shl(exponent).unwrap_or(u32::MAX));
        std::cmp::min(scaled, self.max_delay)
    }

    /// Delay with ±`jitter_fraction` uniform jitter applied, using the
    /// supplied RNG so tests can pin the jitter draw.
    pub fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base = self.base_delay_for(attempt);
        let jitter_span = base.as_secs_f64() * self.jitter_fraction;
        let jitter = rng.gen_range(-jitter_span..=jitter_span);
        let jittered_secs = (base.as_secs_f64() + jitter).max(0.0);
        Duration::from_secs_f64(jittered_secs)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_attempt_before_jitter() {
        let policy = BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(60));
        assert_eq!(policy.base_delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.base_delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn clamps_to_max_delay() {
        let policy = BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(60));
        assert_eq!(policy.base_delay_for(10), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_25_percent() {
        let policy = BackoffPolicy::new(Duration::from_secs(2), Duration::from_secs(60));
        let mut rng = rand::thread_rng();
        for attempt in 1..5 {
            let base = policy.base_delay_for(attempt).as_secs_f64();
            for _ in 0..50 {
                let jittered = policy.delay_for(attempt, &mut rng).as_secs_f64();
                assert!(jittered >= (base * 0.75).max(0.0) - 1e-9);
                assert!(jittered <= base * 1.25 + 1e-9);
            }
        }
    }
}
