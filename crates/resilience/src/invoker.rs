//! Breaker + retry + deadline around a single operation.

use std::sync::Arc;

use tokio::time::Instant;

use crate::breaker::FailureIsolationBreaker;
use crate::config::InvokerConfig;
use crate::context::CallContext;
use crate::error::{Classify, ConfigError, InvokeError};
use crate::operation::Operation;
use crate::retry::{RetryDecision, RetryPolicy};

/// Protects callers of an unreliable operation.
///
/// The breaker decides whether a call may start at all, the retry policy
/// decides whether a failed attempt is worth repeating, and the call deadline
/// bounds the whole thing. Each produces its own [`InvokeError`] variant.
///
/// The breaker is shared between every call made through one invoker (and
/// through clones of the `Arc` returned by [`breaker`](Self::breaker)); retry
/// and deadline state is local to each call.
#[derive(Debug)]
pub struct ResilientInvoker {
    config: InvokerConfig,
    breaker: Arc<FailureIsolationBreaker>,
    retry: RetryPolicy,
}

impl ResilientInvoker {
    /// Creates an invoker with its own breaker.
    pub fn new(config: InvokerConfig) -> Result<Self, ConfigError> {
        let breaker = Arc::new(FailureIsolationBreaker::new(config.breaker.clone()));
        Self::with_breaker(config, breaker)
    }

    /// Creates an invoker that reports to an existing breaker, so several
    /// invokers can guard the same dependency.
    pub fn with_breaker(
        config: InvokerConfig,
        breaker: Arc<FailureIsolationBreaker>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let retry = RetryPolicy::new(config.retry.clone());
        Ok(Self {
            config,
            breaker,
            retry,
        })
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    pub fn breaker(&self) -> &Arc<FailureIsolationBreaker> {
        &self.breaker
    }

    /// Runs `operation` under the breaker, the retry policy, and a deadline
    /// derived from `ctx` and the configured timeout.
    ///
    /// Every outcome except the initial `CircuitOpen` rejection is recorded
    /// with the breaker exactly once. If the returned future is dropped before
    /// completing, nothing is recorded and any half-open trial slot it held is
    /// released.
    #[tracing::instrument(skip_all, fields(breaker = %self.config.breaker.name))]
    pub async fn execute<O>(
        &self,
        ctx: &CallContext,
        operation: &O,
        payload: &O::Payload,
    ) -> Result<O::Output, InvokeError<O::Error>>
    where
        O: Operation + ?Sized,
    {
        let started = Instant::now();
        let call_ctx = ctx.with_timeout(self.config.timeout);

        let Some(permit) = self.breaker.allow() else {
            tracing::debug!("call rejected, circuit open");
            self.observe(started, "circuit_open");
            return Err(InvokeError::CircuitOpen);
        };

        let result = self.run_attempts(&call_ctx, operation, payload, started).await;

        permit.record(result.is_ok());
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        self.observe(started, outcome);
        result
    }

    async fn run_attempts<O>(
        &self,
        ctx: &CallContext,
        operation: &O,
        payload: &O::Payload,
        started: Instant,
    ) -> Result<O::Output, InvokeError<O::Error>>
    where
        O: Operation + ?Sized,
    {
        let mut attempt: u32 = 0;

        loop {
            if ctx.is_done() {
                return Err(InvokeError::Timeout);
            }

            let outcome = tokio::select! {
                biased;
                () = ctx.done() => None,
                result = operation.invoke(ctx, payload) => Some(result),
            };

            let error = match outcome {
                None => {
                    tracing::debug!(attempt, "deadline reached during attempt");
                    return Err(InvokeError::Timeout);
                }
                Some(Ok(output)) => return Ok(output),
                Some(Err(_)) if ctx.is_done() => return Err(InvokeError::Timeout),
                Some(Err(error)) => error,
            };

            if !error.is_retryable() {
                tracing::debug!(attempt, %error, "terminal failure");
                return Err(InvokeError::Terminal(error));
            }

            match self.retry.next_delay(attempt, started.elapsed()) {
                RetryDecision::Stop => {
                    tracing::debug!(attempt, %error, "retry budget exhausted");
                    return Err(InvokeError::MaxRetriesExceeded {
                        attempts: attempt + 1,
                        last: error,
                    });
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(attempt, ?delay, %error, "retrying after backoff");
                    metrics::counter!(
                        "resilience_retries_total",
                        "breaker" => self.config.breaker.name.clone()
                    )
                    .increment(1);

                    tokio::select! {
                        biased;
                        () = ctx.done() => return Err(InvokeError::Timeout),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn observe(&self, started: Instant, outcome: &'static str) {
        metrics::counter!(
            "resilience_calls_total",
            "breaker" => self.config.breaker.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "resilience_call_duration_seconds",
            "breaker" => self.config.breaker.name.clone()
        )
        .record(started.elapsed().as_secs_f64());
    }
}
