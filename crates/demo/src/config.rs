//! Demo configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Which order saga step the failing scenario breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStep {
    None,
    CreateOrder,
    DeductInventory,
    ProcessPayment,
}

impl FromStr for FailStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(FailStep::None),
            "create_order" => Ok(FailStep::CreateOrder),
            "deduct_inventory" => Ok(FailStep::DeductInventory),
            "process_payment" => Ok(FailStep::ProcessPayment),
            other => Err(format!("unknown saga step: {other}")),
        }
    }
}

/// Demo configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `SMS_TIMEOUT_MS`: per-message deadline (default: `2000`)
/// - `SMS_MAX_RETRIES`: retries after the first attempt (default: `3`)
/// - `SMS_FAILURE_RATE`: mock provider failure probability (default: `0.3`)
/// - `SMS_BATCH_SIZE`: messages sent asynchronously (default: `10`)
/// - `SAGA_FAIL_STEP`: `none`, `create_order`, `deduct_inventory` or
///   `process_payment` (default: `process_payment`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub sms_timeout: Duration,
    pub sms_max_retries: u32,
    pub sms_failure_rate: f64,
    pub sms_batch_size: usize,
    pub saga_fail_step: FailStep,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Missing or unparsable values
    /// fall back to their defaults.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            sms_timeout: parse::<u64, _>(&lookup, "SMS_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.sms_timeout),
            sms_max_retries: parse(&lookup, "SMS_MAX_RETRIES").unwrap_or(defaults.sms_max_retries),
            sms_failure_rate: parse::<f64, _>(&lookup, "SMS_FAILURE_RATE")
                .filter(|rate| (0.0..=1.0).contains(rate))
                .unwrap_or(defaults.sms_failure_rate),
            sms_batch_size: parse(&lookup, "SMS_BATCH_SIZE").unwrap_or(defaults.sms_batch_size),
            saga_fail_step: parse(&lookup, "SAGA_FAIL_STEP").unwrap_or(defaults.saga_fail_step),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }
}

fn parse<T, L>(lookup: &L, key: &str) -> Option<T>
where
    T: FromStr,
    L: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sms_timeout: Duration::from_secs(2),
            sms_max_retries: 3,
            sms_failure_rate: 0.3,
            sms_batch_size: 10,
            saga_fail_step: FailStep::ProcessPayment,
            log_level: "info".to_string(),
        }
    }
}
