//! Hooks for compensation outcomes.

use chrono::{DateTime, Utc};
use common::EntityId;

use crate::step::StepId;

/// A compensating action that returned an error.
#[derive(Debug)]
pub struct CompensationFailure<'a> {
    pub saga: &'a str,
    pub execution_id: EntityId,
    pub step: StepId,
    pub error: &'a (dyn std::error::Error + Send + Sync + 'static),
    pub failed_at: DateTime<Utc>,
}

/// Receives compensation outcomes while a saga unwinds.
///
/// Called inline on the executing task, so implementations should return
/// quickly. Nothing an observer does can stop the unwind.
pub trait CompensationObserver: Send + Sync {
    fn on_compensation_completed(&self, _saga: &str, _execution_id: EntityId, _step: StepId) {}

    fn on_compensation_failed(&self, failure: &CompensationFailure<'_>);
}

/// Logs compensation failures. Used unless another observer is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CompensationObserver for TracingObserver {
    fn on_compensation_completed(&self, saga: &str, execution_id: EntityId, step: StepId) {
        tracing::debug!(saga, %execution_id, %step, "compensation completed");
    }

    fn on_compensation_failed(&self, failure: &CompensationFailure<'_>) {
        tracing::warn!(
            saga = failure.saga,
            execution_id = %failure.execution_id,
            step = %failure.step,
            error = %failure.error,
            failed_at = %failure.failed_at,
            "compensation failed; continuing unwind"
        );
    }
}
