//! Reconnection policy for the order transport.
//!
//! The transport retries on its own after a drop; this policy makes the
//! retry contract explicit: a bounded number of attempts and an exponential
//! delay starting at a fixed base, capped at a maximum, with optional jitter.

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Maximum number of consecutive reconnection attempts (0 disables reconnection)
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub base_delay_ms: u64,
    /// Upper bound for the delay between attempts
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Randomization factor in `[0, 1]` applied around the computed delay
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl ReconnectPolicy {
    /// Create a new reconnect policy with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that never reconnects
    pub fn disabled() -> Self {
        Self::default().max_attempts(0)
    }

    /// Set maximum attempts (0 = never reconnect)
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set base delay in milliseconds
    #[must_use]
    pub fn base_delay_ms(mut self, ms: u64) -> Self {
        self.base_delay_ms = ms;
        self
    }

    /// Set maximum delay in milliseconds
    #[must_use]
    pub fn max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor (clamped to `[0, 1]`)
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Whether another attempt is allowed after `attempts_made` failures
    pub fn allows_attempt(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Calculate delay for a given retry attempt, without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }

    /// Calculate delay for a given retry attempt with jitter applied
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.delay_for_attempt(attempt).as_millis() as f64;
        if self.jitter <= 0.0 {
            return Duration::from_millis(base as u64);
        }
        let deviation = rng.gen_range(-self.jitter..=self.jitter) * base;
        let delay_ms = (base + deviation).clamp(0.0, self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_reconnect_policy_default() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 1_000);
        assert_eq!(policy.max_delay_ms, 5_000);
        assert!((policy.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reconnect_policy_builder() {
        let policy = ReconnectPolicy::new()
            .max_attempts(3)
            .base_delay_ms(50)
            .max_delay_ms(10_000)
            .backoff_multiplier(1.5)
            .jitter(4.0);

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 50);
        assert_eq!(policy.max_delay_ms, 10_000);
        assert!((policy.backoff_multiplier - 1.5).abs() < f64::EPSILON);
        assert!((policy.jitter - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_attempts_are_bounded() {
        let policy = ReconnectPolicy::new().max_attempts(2);
        assert!(policy.allows_attempt(0));
        assert!(policy.allows_attempt(1));
        assert!(!policy.allows_attempt(2));
        assert!(!ReconnectPolicy::disabled().allows_attempt(0));
    }

    #[test]
    fn test_delay_calculation() {
        let policy = ReconnectPolicy::new()
            .base_delay_ms(100)
            .backoff_multiplier(2.0)
            .max_delay_ms(1000);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = ReconnectPolicy::new()
            .base_delay_ms(1000)
            .max_delay_ms(1500)
            .jitter(0.5);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..100 {
            let delay = policy.jittered_delay(0, &mut rng);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = ReconnectPolicy::new().base_delay_ms(250).jitter(0.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(policy.jittered_delay(0, &mut rng), Duration::from_millis(250));
    }
}
