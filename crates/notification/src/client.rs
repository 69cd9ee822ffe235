//! The external SMS provider and a mock of it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use resilience::CallContext;

use crate::domain::{Sms, SmsError};

/// Trait for the provider that actually delivers messages.
#[async_trait]
pub trait ExternalSmsClient: Send + Sync {
    async fn send(&self, ctx: &CallContext, sms: &Sms) -> Result<(), SmsError>;
}

/// Provider stand-in that fails at random.
///
/// Each send fails with [`SmsError::ExternalServiceFailure`] with probability
/// `failure_rate`. A send whose context is already done, or becomes done
/// during the simulated latency, fails with [`SmsError::ServiceTimeout`].
#[derive(Debug, Default)]
pub struct MockSmsClient {
    failure_rate: AtomicU64,
    latency: Duration,
    sends: AtomicU64,
}

impl MockSmsClient {
    /// `failure_rate` is clamped to `[0, 1]`.
    pub fn new(failure_rate: f64) -> Self {
        let client = Self::default();
        client.set_failure_rate(failure_rate);
        client
    }

    /// Delays every send by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_failure_rate(&self, failure_rate: f64) {
        let rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        self.failure_rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn failure_rate(&self) -> f64 {
        f64::from_bits(self.failure_rate.load(Ordering::Relaxed))
    }

    /// Number of sends attempted, successful or not.
    pub fn send_count(&self) -> u64 {
        self.sends.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ExternalSmsClient for MockSmsClient {
    async fn send(&self, ctx: &CallContext, _sms: &Sms) -> Result<(), SmsError> {
        self.sends.fetch_add(1, Ordering::Relaxed);
        if ctx.is_done() {
            return Err(SmsError::ServiceTimeout);
        }

        if !self.latency.is_zero() {
            tokio::select! {
                biased;
                _ = ctx.done() => return Err(SmsError::ServiceTimeout),
                _ = tokio::time::sleep(self.latency) => {}
            }
        }

        if rand::thread_rng().gen_bool(self.failure_rate()) {
            return Err(SmsError::ExternalServiceFailure);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sms() -> Sms {
        Sms::new("+989123456789", "Test message")
    }

    #[tokio::test]
    async fn test_zero_failure_rate_always_succeeds() {
        let client = MockSmsClient::new(0.0);
        for _ in 0..100 {
            client.send(&CallContext::background(), &sms()).await.unwrap();
        }
        assert_eq!(client.send_count(), 100);
    }

    #[tokio::test]
    async fn test_full_failure_rate_always_fails() {
        let client = MockSmsClient::new(1.0);
        for _ in 0..100 {
            assert_eq!(
                client.send(&CallContext::background(), &sms()).await,
                Err(SmsError::ExternalServiceFailure)
            );
        }
    }

    #[tokio::test]
    async fn test_done_context_times_out() {
        let client = MockSmsClient::new(0.0);
        let ctx = CallContext::background();
        ctx.cancel();

        assert_eq!(client.send(&ctx, &sms()).await, Err(SmsError::ServiceTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_latency_times_out() {
        let client = MockSmsClient::new(0.0).with_latency(Duration::from_millis(50));
        let ctx = CallContext::background().with_timeout(Duration::from_millis(10));

        assert_eq!(client.send(&ctx, &sms()).await, Err(SmsError::ServiceTimeout));
    }

    #[test]
    fn test_failure_rate_is_clamped() {
        let client = MockSmsClient::new(3.0);
        assert_eq!(client.failure_rate(), 1.0);
        client.set_failure_rate(-1.0);
        assert_eq!(client.failure_rate(), 0.0);
        client.set_failure_rate(f64::NAN);
        assert_eq!(client.failure_rate(), 0.0);
    }
}
