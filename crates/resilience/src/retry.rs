//! Exponential backoff with jitter.
//!
//! ```text
//! attempt   base delay (initial=500ms, multiplier=1.5)   with jitter (±50%)
//! ─────────────────────────────────────────────────────────────────────────
//!    0          500ms                                     250ms - 750ms
//!    1          750ms                                     375ms - 1125ms
//!    2         1125ms                                     562ms - 1687ms
//! ```
//!
//! A delay is only granted if sleeping it would keep the call within
//! `max_elapsed_time`, and only while `attempt < max_retries`.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// What to do after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    RetryAfter(Duration),
    /// The retry budget is spent.
    Stop,
}

/// Pure function of its configuration, the attempt index, and elapsed time.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Decides whether to retry after the attempt with zero-based index
    /// `attempt` failed, `elapsed` after the first attempt started.
    pub fn next_delay(&self, attempt: u32, elapsed: Duration) -> RetryDecision {
        if self
            .config
            .max_retries
            .is_some_and(|max_retries| attempt >= max_retries)
        {
            return RetryDecision::Stop;
        }

        let delay = self.jittered(self.base_delay(attempt));
        if elapsed.saturating_add(delay) > self.config.max_elapsed_time {
            return RetryDecision::Stop;
        }
        RetryDecision::RetryAfter(delay)
    }

    /// `initial_interval * multiplier^attempt`, capped at `max_interval`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.config.initial_interval.as_secs_f64() * self.config.multiplier.powi(exponent);
        let capped = secs.min(self.config.max_interval.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.config.max_interval)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let factor = self.config.randomization_factor;
        if factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let secs = delay.as_secs_f64();
        let low = secs * (1.0 - factor);
        let high = secs * (1.0 + factor);
        let jittered = rand::thread_rng().gen_range(low..=high);
        Duration::try_from_secs_f64(jittered).unwrap_or(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: Option<u32>, max_elapsed: Duration) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.0,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: max_elapsed,
            max_retries,
        })
    }

    #[test]
    fn test_delays_grow_exponentially() {
        let p = policy(None, Duration::from_secs(3600));
        assert_eq!(
            p.next_delay(0, Duration::ZERO),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );
        assert_eq!(
            p.next_delay(1, Duration::ZERO),
            RetryDecision::RetryAfter(Duration::from_millis(750))
        );
        assert_eq!(
            p.next_delay(2, Duration::ZERO),
            RetryDecision::RetryAfter(Duration::from_millis(1125))
        );
    }

    #[test]
    fn test_delay_capped_at_max_interval() {
        let p = policy(None, Duration::from_secs(3600));
        assert_eq!(p.base_delay(40), Duration::from_secs(60));
        assert_eq!(p.base_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_stops_after_max_retries() {
        let p = policy(Some(2), Duration::from_secs(3600));
        assert!(matches!(
            p.next_delay(1, Duration::ZERO),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.next_delay(2, Duration::ZERO), RetryDecision::Stop);
    }

    #[test]
    fn test_stops_when_delay_would_exceed_elapsed_budget() {
        let p = policy(None, Duration::from_secs(2));
        assert_eq!(
            p.next_delay(0, Duration::from_millis(1500)),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );
        assert_eq!(p.next_delay(0, Duration::from_millis(1501)), RetryDecision::Stop);
    }

    #[test]
    fn test_jitter_stays_within_randomization_bounds() {
        let p = RetryPolicy::new(RetryConfig {
            randomization_factor: 0.5,
            max_elapsed_time: Duration::from_secs(3600),
            max_retries: None,
            ..Default::default()
        });
        for _ in 0..200 {
            match p.next_delay(1, Duration::ZERO) {
                RetryDecision::RetryAfter(delay) => {
                    assert!(delay >= Duration::from_millis(375), "{delay:?}");
                    assert!(delay <= Duration::from_millis(1125), "{delay:?}");
                }
                RetryDecision::Stop => panic!("unexpected stop"),
            }
        }
    }
}
