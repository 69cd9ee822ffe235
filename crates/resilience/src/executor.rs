//! Fire-and-forget invocations with an explicit join barrier.

use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::context::CallContext;
use crate::error::InvokeError;
use crate::invoker::ResilientInvoker;
use crate::operation::Operation;

/// Runs [`ResilientInvoker`] calls on independent tasks.
///
/// Each submission invokes its completion callback exactly once, on the task
/// that ran it. Completions arrive in no particular order and callbacks may
/// run concurrently with each other, so shared state they touch needs its
/// own synchronization.
#[derive(Debug)]
pub struct AsyncExecutor {
    invoker: Arc<ResilientInvoker>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl AsyncExecutor {
    pub fn new(invoker: Arc<ResilientInvoker>) -> Self {
        Self {
            invoker,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn invoker(&self) -> &Arc<ResilientInvoker> {
        &self.invoker
    }

    /// Starts one invocation on a new task and hands its result to
    /// `on_complete`. Must be called from within a Tokio runtime.
    pub fn submit<O, F>(&self, ctx: CallContext, operation: Arc<O>, payload: O::Payload, on_complete: F)
    where
        O: Operation + 'static,
        O::Payload: 'static,
        O::Output: 'static,
        F: FnOnce(Result<O::Output, InvokeError<O::Error>>) + Send + 'static,
    {
        let invoker = Arc::clone(&self.invoker);
        let handle = tokio::spawn(async move {
            let result = invoker.execute(&ctx, operation.as_ref(), &payload).await;
            on_complete(result);
        });

        let mut pending = self.pending.lock();
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    /// Number of submissions not yet joined by [`wait`](Self::wait).
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Waits until every submission made before this call has finished and
    /// its callback has returned.
    ///
    /// Submissions made while waiting are left for the next call. Concurrent
    /// callers each wait only for the handles they took.
    pub async fn wait(&self) {
        let handles = std::mem::take(&mut *self.pending.lock());
        if handles.is_empty() {
            return;
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "submitted invocation did not complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use thiserror::Error;

    use super::*;
    use crate::config::InvokerConfig;
    use crate::error::Classify;

    #[derive(Debug, Error)]
    #[error("never")]
    struct Never;

    impl Classify for Never {
        fn is_retryable(&self) -> bool {
            false
        }
    }

    /// Sleeps for `payload` milliseconds, then echoes it.
    struct Echo;

    #[async_trait]
    impl Operation for Echo {
        type Payload = u64;
        type Output = u64;
        type Error = Never;

        async fn invoke(&self, _ctx: &CallContext, payload: &u64) -> Result<u64, Never> {
            tokio::time::sleep(Duration::from_millis(*payload)).await;
            Ok(*payload)
        }
    }

    fn executor() -> AsyncExecutor {
        let invoker = ResilientInvoker::new(InvokerConfig::new(Duration::from_secs(5))).unwrap();
        AsyncExecutor::new(Arc::new(invoker))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_joins_all_callbacks() {
        let executor = executor();
        let completed = Arc::new(Mutex::new(Vec::new()));
        let op = Arc::new(Echo);

        for delay in [30, 10, 20] {
            let completed = Arc::clone(&completed);
            executor.submit(CallContext::background(), Arc::clone(&op), delay, move |result| {
                completed.lock().push(result.unwrap());
            });
        }

        executor.wait().await;

        let mut completed = completed.lock().clone();
        assert_eq!(completed.len(), 3);
        completed.sort_unstable();
        assert_eq!(completed, vec![10, 20, 30]);
        assert_eq!(executor.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_callback_runs_once() {
        let executor = executor();
        let calls = Arc::new(AtomicUsize::new(0));
        let op = Arc::new(Echo);

        for _ in 0..50 {
            let calls = Arc::clone(&calls);
            executor.submit(CallContext::background(), Arc::clone(&op), 1, move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        executor.wait().await;
        executor.wait().await;

        assert_eq!(calls.load(Ordering::SeqCst), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reported_through_callback() {
        let executor = executor();
        let result = Arc::new(Mutex::new(None));
        let ctx = CallContext::background().with_timeout(Duration::from_millis(5));

        let slot = Arc::clone(&result);
        executor.submit(ctx, Arc::new(Echo), 1_000, move |r| {
            *slot.lock() = Some(r.map_err(|e| e.kind()));
        });
        executor.wait().await;

        assert_eq!(
            *result.lock(),
            Some(Err(crate::error::ErrorKind::Timeout))
        );
    }

    #[tokio::test]
    async fn test_wait_without_submissions_returns_immediately() {
        executor().wait().await;
    }
}
