//! Invoker configuration. Constructed once, immutable after the invoker is built.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Circuit breaker settings for one logical downstream dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Name used in logs and metric labels.
    pub name: String,

    /// Requests that must be observed before the failure ratio is evaluated.
    pub min_requests: u32,

    /// Failure ratio (failures / requests) at or above which the breaker opens.
    pub failure_ratio_threshold: f64,

    /// How long the breaker stays open before admitting trial calls.
    #[serde(with = "common::serde_duration")]
    pub open_cooldown: Duration,

    /// Maximum number of concurrent trial calls while half-open.
    pub half_open_trial_cap: u32,

    /// Consecutive trial successes required to close again.
    pub half_open_successes_to_close: u32,

    /// Closed-state evaluation window. Counters reset when it elapses.
    /// `None` keeps counting until the next state transition.
    #[serde(default, with = "common::serde_duration::option")]
    pub window: Option<Duration>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_requests: 5,
            failure_ratio_threshold: 0.6,
            open_cooldown: Duration::from_secs(30),
            half_open_trial_cap: 2,
            half_open_successes_to_close: 2,
            window: Some(Duration::from_secs(60)),
        }
    }
}

impl BreakerConfig {
    /// Creates a default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_requests == 0 {
            return Err(ConfigError::ZeroMinRequests);
        }
        if !(self.failure_ratio_threshold > 0.0 && self.failure_ratio_threshold <= 1.0) {
            return Err(ConfigError::InvalidFailureRatio(
                self.failure_ratio_threshold,
            ));
        }
        if self.half_open_trial_cap == 0 {
            return Err(ConfigError::ZeroTrialCap);
        }
        if self.half_open_successes_to_close == 0 {
            return Err(ConfigError::ZeroSuccessesToClose);
        }
        Ok(())
    }
}

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, before jitter.
    #[serde(with = "common::serde_duration")]
    pub initial_interval: Duration,

    /// Growth factor applied per attempt.
    pub multiplier: f64,

    /// Jitter as a fraction of the computed delay (0.5 = ±50%).
    pub randomization_factor: f64,

    /// Upper bound on a single delay.
    #[serde(with = "common::serde_duration")]
    pub max_interval: Duration,

    /// Total time budget measured from the first attempt.
    #[serde(with = "common::serde_duration")]
    pub max_elapsed_time: Duration,

    /// Maximum number of retries after the first attempt. `None` bounds
    /// retries by elapsed time only.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: Duration::from_secs(60),
            max_elapsed_time: Duration::from_secs(2),
            max_retries: Some(3),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.multiplier >= 1.0) {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(ConfigError::InvalidRandomization(
                self.randomization_factor,
            ));
        }
        Ok(())
    }
}

/// Complete configuration of a [`ResilientInvoker`](crate::ResilientInvoker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Hard per-call deadline.
    #[serde(with = "common::serde_duration")]
    pub timeout: Duration,

    pub retry: RetryConfig,

    pub breaker: BreakerConfig,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl InvokerConfig {
    /// Creates a configuration whose retry budget matches the call timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            retry: RetryConfig {
                max_elapsed_time: timeout,
                ..Default::default()
            },
            breaker: BreakerConfig::default(),
        }
    }

    /// Sets the breaker name used in logs and metrics.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.breaker.name = name.into();
        self
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = Some(max_retries);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Checks every field; the invoker refuses to start on invalid settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.retry.validate()?;
        self.breaker.validate()
    }
}
