//! Saga steps: a forward action paired with its compensation.

use std::fmt;
use std::future::Future;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::error::BoxError;

type Action = Box<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Identifies a step. Compared by name, so callers can hold step ids as
/// constants and match them against [`SagaError::is_step`](crate::SagaError::is_step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(&'static str);

impl StepId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// One unit of a saga.
///
/// Both actions are factories: each call produces a fresh future, so the
/// same saga can be executed more than once. Any state an action needs is
/// captured by the closure.
pub struct SagaStep {
    id: StepId,
    forward: Action,
    compensate: Action,
}

impl SagaStep {
    pub fn new<F, Fut, E, C, CFut, CE>(id: StepId, forward: F, compensate: C) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
        C: Fn() -> CFut + Send + Sync + 'static,
        CFut: Future<Output = Result<(), CE>> + Send + 'static,
        CE: Into<BoxError>,
    {
        Self {
            id,
            forward: boxed(forward),
            compensate: boxed(compensate),
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub(crate) fn run_forward(&self) -> BoxFuture<'static, Result<(), BoxError>> {
        (self.forward)()
    }

    pub(crate) fn run_compensation(&self) -> BoxFuture<'static, Result<(), BoxError>> {
        (self.compensate)()
    }
}

impl fmt::Debug for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaStep").field("id", &self.id).finish_non_exhaustive()
    }
}

fn boxed<F, Fut, E>(action: F) -> Action
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    Box::new(move || {
        let fut = action();
        async move { fut.await.map_err(Into::<BoxError>::into) }.boxed()
    })
}
