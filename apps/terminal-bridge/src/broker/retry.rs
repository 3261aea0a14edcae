//! Retry policy for the verify-after-create poll.
//!
//! A broker-acknowledged market order is not trusted until the position
//! shows up in the reconciled cache. The poll is a bounded synchronous
//! retry; attempts and backoff growth are configuration so operators can
//! trade verification latency against gateway load.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy for verify-after-create polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRetryPolicy {
    /// Number of cache polls before giving up (default: 5).
    pub max_attempts: u32,
    /// Pause before the second poll (default: 1s).
    pub initial_backoff: Duration,
    /// Cap on any single pause (default: 5s).
    pub max_backoff: Duration,
    /// Growth factor between pauses; 1.0 keeps the fixed cadence the
    /// terminal was observed to need (default: 1.0).
    pub backoff_multiplier: f64,
    /// Randomization factor, 0.0..1.0; 0 disables jitter (default: 0).
    pub jitter_factor: f64,
}

impl Default for VerifyRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }
}

/// Stateful backoff sequence for one verification run.
#[derive(Debug)]
pub struct BackoffSchedule {
    current_attempt: u32,
    max_attempts: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
    jitter_factor: f64,
}

impl BackoffSchedule {
    /// Start a new schedule from a policy.
    #[must_use]
    pub const fn new(policy: &VerifyRetryPolicy) -> Self {
        Self {
            current_attempt: 0,
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
            jitter_factor: policy.jitter_factor,
        }
    }

    /// Pause before the next poll, or `None` once attempts are exhausted.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        // One fewer pause than polls: the first poll happens immediately.
        if self.current_attempt + 1 >= self.max_attempts {
            return None;
        }

        let base_ms = self.base_backoff_ms();
        let jittered_ms = self.apply_jitter(base_ms).min(self.max_backoff_ms);

        self.current_attempt += 1;

        Some(Duration::from_millis(jittered_ms))
    }

    /// Polls taken so far (pauses consumed plus the initial poll).
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.current_attempt + 1
    }

    fn base_backoff_ms(&self) -> u64 {
        let multiplier = self.backoff_multiplier.powi(self.current_attempt as i32);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let backoff = (self.initial_backoff_ms as f64 * multiplier) as u64;
        backoff.min(self.max_backoff_ms)
    }

    fn apply_jitter(&self, backoff_ms: u64) -> u64 {
        if self.jitter_factor <= 0.0 {
            return backoff_ms;
        }

        let mut rng = rand::rng();
        let jitter_range = backoff_ms as f64 * self.jitter_factor;
        let min = (backoff_ms as f64 - jitter_range).max(0.0);
        let max = backoff_ms as f64 + jitter_range;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jittered = rng.random_range(min..=max) as u64;
        jittered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_observed_cadence() {
        let policy = VerifyRetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
        assert!((policy.backoff_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn fixed_cadence_yields_equal_pauses() {
        let policy = VerifyRetryPolicy::default();
        let mut schedule = BackoffSchedule::new(&policy);

        // 5 polls means 4 pauses of 1s each.
        for _ in 0..4 {
            assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(1)));
        }
        assert!(schedule.next_backoff().is_none());
        assert_eq!(schedule.attempt(), 5);
    }

    #[test]
    fn exponential_growth_and_cap() {
        let policy = VerifyRetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };
        let mut schedule = BackoffSchedule::new(&policy);

        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(500)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(1000)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(2000)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(2000))); // capped
        assert_eq!(schedule.next_backoff(), Some(Duration::from_millis(2000))); // capped
        assert!(schedule.next_backoff().is_none());
    }

    #[test]
    fn jitter_stays_within_range() {
        let policy = VerifyRetryPolicy {
            jitter_factor: 0.2,
            ..Default::default()
        };

        for _ in 0..100 {
            let mut schedule = BackoffSchedule::new(&policy);
            let duration = schedule
                .next_backoff()
                .expect("first backoff should always exist");
            assert!(
                duration >= Duration::from_millis(800) && duration <= Duration::from_millis(1200),
                "duration {duration:?} not in expected range 800-1200ms"
            );
        }
    }

    #[test]
    fn single_attempt_never_pauses() {
        let policy = VerifyRetryPolicy {
            max_attempts: 1,
            ..Default::default()
        };
        let mut schedule = BackoffSchedule::new(&policy);
        assert!(schedule.next_backoff().is_none());
        assert_eq!(schedule.attempt(), 1);
    }
}
