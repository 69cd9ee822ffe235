//! The unit of work protected by a [`ResilientInvoker`](crate::ResilientInvoker).

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::Classify;

/// An externally supplied, possibly unreliable operation.
///
/// The invoker never inspects the payload. It only looks at whether the
/// result is `Ok`, and, for errors, at [`Classify::is_retryable`].
/// Implementations should honor `ctx` themselves: the invoker stops waiting
/// once the deadline passes, but cannot stop work already handed off
/// elsewhere (a remote request, a spawned task).
#[async_trait]
pub trait Operation: Send + Sync {
    type Payload: Send + Sync;
    type Output: Send;
    type Error: Classify + std::error::Error + Send + Sync + 'static;

    async fn invoke(
        &self,
        ctx: &CallContext,
        payload: &Self::Payload,
    ) -> Result<Self::Output, Self::Error>;
}
