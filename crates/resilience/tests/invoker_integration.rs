//! Integration tests for the resilient invocation stack.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use resilience::{
    AsyncExecutor, BreakerConfig, BreakerState, CallContext, Classify, ErrorKind, InvokeError,
    InvokerConfig, Operation, ResilientInvoker, RetryConfig,
};
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
enum GatewayError {
    #[error("gateway unavailable")]
    Unavailable,
    #[error("request rejected")]
    Rejected,
}

impl Classify for GatewayError {
    fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable)
    }
}

/// A downstream gateway whose health can be switched at runtime.
#[derive(Default)]
struct Gateway {
    down: AtomicBool,
    calls: AtomicU32,
}

impl Gateway {
    fn down() -> Self {
        let gateway = Self::default();
        gateway.down.store(true, Ordering::SeqCst);
        gateway
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operation for Gateway {
    type Payload = String;
    type Output = usize;
    type Error = GatewayError;

    async fn invoke(&self, _ctx: &CallContext, payload: &String) -> Result<usize, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if payload.is_empty() {
            return Err(GatewayError::Rejected);
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable);
        }
        Ok(payload.len())
    }
}

fn config(timeout: Duration) -> InvokerConfig {
    InvokerConfig::new(timeout)
        .with_retry(RetryConfig {
            initial_interval: Duration::from_millis(50),
            multiplier: 1.5,
            randomization_factor: 0.0,
            max_interval: Duration::from_secs(1),
            max_elapsed_time: timeout,
            max_retries: None,
        })
        .with_breaker(BreakerConfig {
            window: None,
            ..BreakerConfig::named("gateway")
        })
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_operation_exhausts_elapsed_budget() {
    let invoker = ResilientInvoker::new(config(Duration::from_secs(1))).unwrap();
    let gateway = Gateway::down();
    let start = Instant::now();

    let err = invoker
        .execute(&CallContext::background(), &gateway, &"hello".to_string())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MaxRetriesExceeded);
    assert_eq!(err.cause(), Some(&GatewayError::Unavailable));
    assert!(gateway.calls() > 1);
    // Never beyond the deadline plus one in-flight attempt.
    assert!(start.elapsed() <= Duration::from_secs(1) + Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn test_terminal_error_propagates_unchanged() {
    let invoker = ResilientInvoker::new(config(Duration::from_secs(1))).unwrap();
    let gateway = Gateway::default();

    let err = invoker
        .execute(&CallContext::background(), &gateway, &String::new())
        .await
        .unwrap_err();

    assert!(matches!(err, InvokeError::Terminal(GatewayError::Rejected)));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_then_probes_then_closes() {
    let invoker =
        ResilientInvoker::new(config(Duration::from_millis(100)).with_max_retries(0)).unwrap();
    let gateway = Gateway::down();
    let payload = "ping".to_string();

    for _ in 0..5 {
        let err = invoker
            .execute(&CallContext::background(), &gateway, &payload)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MaxRetriesExceeded);
    }
    assert_eq!(invoker.breaker().state(), BreakerState::Open);

    let calls = gateway.calls();
    let err = invoker
        .execute(&CallContext::background(), &gateway, &payload)
        .await
        .unwrap_err();
    assert_eq!(err, InvokeError::CircuitOpen);
    assert_eq!(gateway.calls(), calls);

    gateway.set_down(false);
    tokio::time::advance(Duration::from_secs(30)).await;

    for _ in 0..2 {
        let len = invoker
            .execute(&CallContext::background(), &gateway, &payload)
            .await
            .unwrap();
        assert_eq!(len, 4);
    }
    assert_eq!(invoker.breaker().state(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_one_breaker() {
    let invoker = Arc::new(
        ResilientInvoker::new(config(Duration::from_millis(100)).with_max_retries(0)).unwrap(),
    );
    let executor = AsyncExecutor::new(Arc::clone(&invoker));
    let gateway = Arc::new(Gateway::down());
    let kinds = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..20 {
        let kinds = Arc::clone(&kinds);
        executor.submit(
            CallContext::background(),
            Arc::clone(&gateway),
            "ping".to_string(),
            move |result| kinds.lock().push(result.unwrap_err().kind()),
        );
    }
    executor.wait().await;

    let kinds = kinds.lock();
    assert_eq!(kinds.len(), 20);
    assert!(
        kinds
            .iter()
            .all(|k| matches!(k, ErrorKind::MaxRetriesExceeded | ErrorKind::CircuitOpen))
    );
    assert_eq!(invoker.breaker().state(), BreakerState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_parent_deadline_tighter_than_timeout_wins() {
    let invoker = ResilientInvoker::new(config(Duration::from_secs(10))).unwrap();
    let gateway = Gateway::down();
    let ctx = CallContext::background().with_timeout(Duration::from_millis(120));
    let start = Instant::now();

    let err = invoker
        .execute(&ctx, &gateway, &"ping".to_string())
        .await
        .unwrap_err();

    assert_eq!(err, InvokeError::Timeout);
    assert!(start.elapsed() <= Duration::from_millis(120));
}
