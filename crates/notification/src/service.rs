//! Resilient SMS sending, synchronous and fire-and-forget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilience::{
    AsyncExecutor, CallContext, ConfigError, FailureIsolationBreaker, InvokeError, InvokerConfig,
    Operation, ResilientInvoker,
};

use crate::client::ExternalSmsClient;
use crate::domain::{Sms, SmsError};

/// Breaker name used in logs and metric labels.
pub const BREAKER_NAME: &str = "sms-service";

/// One delivery attempt through the external client.
#[derive(Clone)]
pub struct SendSmsOperation {
    client: Arc<dyn ExternalSmsClient>,
}

impl SendSmsOperation {
    pub fn new(client: Arc<dyn ExternalSmsClient>) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for SendSmsOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendSmsOperation").finish_non_exhaustive()
    }
}

#[async_trait]
impl Operation for SendSmsOperation {
    type Payload = Sms;
    type Output = ();
    type Error = SmsError;

    async fn invoke(&self, ctx: &CallContext, sms: &Sms) -> Result<(), SmsError> {
        self.client.send(ctx, sms).await
    }
}

/// Sends messages and waits for the outcome.
#[derive(Debug, Clone)]
pub struct SmsService {
    invoker: Arc<ResilientInvoker>,
    operation: Arc<SendSmsOperation>,
}

impl SmsService {
    /// Creates a service with its own breaker named [`BREAKER_NAME`].
    pub fn new(
        client: Arc<dyn ExternalSmsClient>,
        max_retries: u32,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Self::with_config(client, Self::config(max_retries, timeout))
    }

    pub fn with_config(
        client: Arc<dyn ExternalSmsClient>,
        config: InvokerConfig,
    ) -> Result<Self, ConfigError> {
        let invoker = ResilientInvoker::new(config)?;
        Ok(Self::with_invoker(client, Arc::new(invoker)))
    }

    /// Sends through an existing invoker and shares its breaker.
    pub fn with_invoker(client: Arc<dyn ExternalSmsClient>, invoker: Arc<ResilientInvoker>) -> Self {
        Self {
            invoker,
            operation: Arc::new(SendSmsOperation::new(client)),
        }
    }

    /// Default settings for a service with the given retry count and
    /// per-message timeout.
    pub fn config(max_retries: u32, timeout: Duration) -> InvokerConfig {
        InvokerConfig::new(timeout)
            .with_name(BREAKER_NAME)
            .with_max_retries(max_retries)
    }

    pub fn breaker(&self) -> &Arc<FailureIsolationBreaker> {
        self.invoker.breaker()
    }

    /// Validates and sends one message.
    ///
    /// An invalid recipient is rejected as `Terminal(InvalidRecipient)`
    /// before the breaker is consulted, so bad input never counts against
    /// the provider.
    #[tracing::instrument(skip_all, fields(message_len = sms.message.len()))]
    pub async fn send(&self, ctx: &CallContext, sms: &Sms) -> Result<(), InvokeError<SmsError>> {
        sms.validate().map_err(InvokeError::Terminal)?;

        let result = self
            .invoker
            .execute(ctx, self.operation.as_ref(), sms)
            .await;
        match &result {
            Ok(()) => tracing::info!("sms sent"),
            Err(e) => tracing::warn!(error = %e, kind = %e.kind(), "sms not sent"),
        }
        result
    }
}

/// Sends messages on background tasks.
///
/// Shares the invoker, and therefore the breaker, of the [`SmsService`] it
/// was built from.
#[derive(Debug)]
pub struct AsyncSmsService {
    executor: AsyncExecutor,
    operation: Arc<SendSmsOperation>,
}

impl AsyncSmsService {
    pub fn new(service: &SmsService) -> Self {
        Self {
            executor: AsyncExecutor::new(Arc::clone(&service.invoker)),
            operation: Arc::clone(&service.operation),
        }
    }

    /// Starts sending `sms` and returns immediately. `callback` runs exactly
    /// once with the result.
    ///
    /// A message with an invalid recipient is not submitted; its callback
    /// runs before this returns. Must be called from within a Tokio runtime.
    pub fn send_async<F>(&self, ctx: CallContext, sms: Sms, callback: F)
    where
        F: FnOnce(Result<(), InvokeError<SmsError>>) + Send + 'static,
    {
        if let Err(e) = sms.validate() {
            tracing::warn!(error = %e, "sms rejected before submission");
            callback(Err(InvokeError::Terminal(e)));
            return;
        }
        self.executor
            .submit(ctx, Arc::clone(&self.operation), sms, callback);
    }

    /// Number of sends not yet joined by [`wait`](Self::wait).
    pub fn pending(&self) -> usize {
        self.executor.pending()
    }

    /// Waits for every send started before this call, callbacks included.
    pub async fn wait(&self) {
        self.executor.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockSmsClient;

    #[test]
    fn test_config_defaults() {
        let config = SmsService::config(3, Duration::from_secs(2));
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.retry.max_elapsed_time, Duration::from_secs(2));
        assert_eq!(config.retry.max_retries, Some(3));
        assert_eq!(config.breaker.name, BREAKER_NAME);
        assert_eq!(config.breaker.min_requests, 5);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let client = Arc::new(MockSmsClient::new(0.0));
        let result = SmsService::new(client, 3, Duration::ZERO);
        assert!(matches!(result, Err(ConfigError::ZeroTimeout)));
    }

    #[tokio::test]
    async fn test_invalid_recipient_skips_client_and_breaker() {
        let client = Arc::new(MockSmsClient::new(0.0));
        let service = SmsService::new(client.clone(), 3, Duration::from_secs(2)).unwrap();

        let err = service
            .send(&CallContext::background(), &Sms::new("12345", "hi"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            InvokeError::Terminal(SmsError::InvalidRecipient("12345".into()))
        );
        assert_eq!(client.send_count(), 0);
        assert_eq!(service.breaker().counts().requests, 0);
    }

    #[tokio::test]
    async fn test_async_invalid_recipient_calls_back_inline() {
        let client = Arc::new(MockSmsClient::new(0.0));
        let service = SmsService::new(client, 3, Duration::from_secs(2)).unwrap();
        let async_service = AsyncSmsService::new(&service);

        let (tx, rx) = std::sync::mpsc::channel();
        async_service.send_async(CallContext::background(), Sms::new("", "hi"), move |r| {
            tx.send(r).unwrap();
        });

        assert_eq!(async_service.pending(), 0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(InvokeError::Terminal(SmsError::InvalidRecipient(_)))
        ));
    }
}
