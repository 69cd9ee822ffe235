//! Sequential saga execution with reverse-order compensation.

use std::sync::Arc;

use common::EntityId;
use tokio::time::Instant;

use crate::error::SagaError;
use crate::observer::{CompensationFailure, CompensationObserver, TracingObserver};
use crate::state::SagaState;
use crate::step::{SagaStep, StepId};

/// Runs a fixed list of steps in order.
///
/// On the first forward failure, the steps that already succeeded are
/// compensated in reverse order of completion, then the failure is returned.
/// The failed step itself is never compensated. Each call to
/// [`execute`](Self::execute) is an independent execution with its own
/// compensation stack.
pub struct SagaOrchestrator {
    name: String,
    steps: Vec<SagaStep>,
    observer: Arc<dyn CompensationObserver>,
}

impl SagaOrchestrator {
    /// Creates an orchestrator that logs compensation failures.
    pub fn new(name: impl Into<String>, steps: Vec<SagaStep>) -> Self {
        Self {
            name: name.into(),
            steps,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replaces the compensation observer.
    pub fn with_observer(mut self, observer: Arc<dyn CompensationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step ids in execution order.
    pub fn step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(SagaStep::id).collect()
    }

    /// Executes every step in order.
    ///
    /// Returns `Ok(())` only if every forward action succeeded. Otherwise
    /// returns [`SagaError::StepFailed`] after compensation has finished,
    /// whether or not every compensation succeeded.
    #[tracing::instrument(skip(self), fields(saga = %self.name, execution_id = tracing::field::Empty))]
    pub async fn execute(&self) -> Result<(), SagaError> {
        let mut execution = Execution::new();
        tracing::Span::current().record("execution_id", tracing::field::display(execution.id));
        metrics::counter!("saga_executions_total", "saga" => self.name.clone()).increment(1);
        let started = Instant::now();

        // Completed steps, most recent last.
        let mut completed: Vec<&SagaStep> = Vec::with_capacity(self.steps.len());

        for (index, step) in self.steps.iter().enumerate() {
            execution.advance(SagaState::Running { step: index });
            tracing::info!(step = %step.id(), "saga step started");

            match step.run_forward().await {
                Ok(()) => {
                    tracing::info!(step = %step.id(), "saga step completed");
                    completed.push(step);
                }
                Err(source) => {
                    tracing::warn!(step = %step.id(), error = %source, "saga step failed");
                    execution.advance(SagaState::Compensating { failed_step: index });

                    let clean = self.compensate(execution.id, completed).await;
                    execution.advance(if clean {
                        SagaState::Compensated
                    } else {
                        SagaState::Failed
                    });

                    metrics::counter!("saga_failed", "saga" => self.name.clone()).increment(1);
                    metrics::histogram!("saga_duration_seconds", "saga" => self.name.clone())
                        .record(started.elapsed().as_secs_f64());
                    tracing::warn!(state = %execution.state, failed_step = %step.id(), "saga aborted");

                    return Err(SagaError::StepFailed {
                        step: step.id(),
                        source,
                    });
                }
            }
        }

        execution.advance(SagaState::Completed);
        metrics::counter!("saga_completed", "saga" => self.name.clone()).increment(1);
        metrics::histogram!("saga_duration_seconds", "saga" => self.name.clone())
            .record(started.elapsed().as_secs_f64());
        tracing::info!(steps = self.steps.len(), "saga completed");
        Ok(())
    }

    /// Pops and compensates every completed step. Returns false if any
    /// compensation failed.
    async fn compensate(&self, execution_id: EntityId, mut completed: Vec<&SagaStep>) -> bool {
        let mut clean = true;

        while let Some(step) = completed.pop() {
            tracing::info!(step = %step.id(), "compensating step");

            match step.run_compensation().await {
                Ok(()) => {
                    self.observer
                        .on_compensation_completed(&self.name, execution_id, step.id());
                }
                Err(error) => {
                    clean = false;
                    metrics::counter!("saga_compensations_failed", "saga" => self.name.clone())
                        .increment(1);
                    self.observer.on_compensation_failed(&CompensationFailure {
                        saga: &self.name,
                        execution_id,
                        step: step.id(),
                        error: error.as_ref(),
                        failed_at: chrono::Utc::now(),
                    });
                }
            }
        }

        clean
    }
}

impl std::fmt::Debug for SagaOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaOrchestrator")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

struct Execution {
    id: EntityId,
    state: SagaState,
}

impl Execution {
    fn new() -> Self {
        Self {
            id: EntityId::new(),
            state: SagaState::Pending,
        }
    }

    fn advance(&mut self, next: SagaState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal saga transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(from = %self.state, to = %next, "saga state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::error::ServiceError;

    type Log = Arc<Mutex<Vec<String>>>;

    /// A step that records its forward and compensating runs into `log`.
    fn recording_step(
        name: &'static str,
        log: &Log,
        fail_forward: bool,
        fail_compensation: bool,
    ) -> SagaStep {
        let forward_log = Arc::clone(log);
        let compensate_log = Arc::clone(log);
        SagaStep::new(
            StepId::new(name),
            move || {
                let log = Arc::clone(&forward_log);
                async move {
                    log.lock().push(format!("do:{name}"));
                    if fail_forward {
                        Err(ServiceError::OrderRejected(name.to_string()))
                    } else {
                        Ok(())
                    }
                }
            },
            move || {
                let log = Arc::clone(&compensate_log);
                async move {
                    log.lock().push(format!("undo:{name}"));
                    if fail_compensation {
                        Err(ServiceError::NotFound(name.to_string()))
                    } else {
                        Ok(())
                    }
                }
            },
        )
    }

    #[tokio::test]
    async fn test_all_steps_succeed_without_compensation() {
        let log = Log::default();
        let saga = SagaOrchestrator::new(
            "ok",
            vec![
                recording_step("a", &log, false, false),
                recording_step("b", &log, false, false),
                recording_step("c", &log, false, false),
            ],
        );

        saga.execute().await.unwrap();

        assert_eq!(*log.lock(), vec!["do:a", "do:b", "do:c"]);
    }

    #[tokio::test]
    async fn test_failure_compensates_completed_steps_in_reverse() {
        let log = Log::default();
        let saga = SagaOrchestrator::new(
            "abc",
            vec![
                recording_step("a", &log, false, false),
                recording_step("b", &log, false, false),
                recording_step("c", &log, true, false),
            ],
        );

        let err = saga.execute().await.unwrap_err();

        assert!(err.is_step(StepId::new("c")));
        assert_eq!(
            err.cause_as::<ServiceError>(),
            Some(&ServiceError::OrderRejected("c".into()))
        );
        assert_eq!(
            *log.lock(),
            vec!["do:a", "do:b", "do:c", "undo:b", "undo:a"]
        );
    }

    #[tokio::test]
    async fn test_first_step_failure_runs_no_compensation() {
        let log = Log::default();
        let saga = SagaOrchestrator::new(
            "first",
            vec![
                recording_step("a", &log, true, false),
                recording_step("b", &log, false, false),
            ],
        );

        let err = saga.execute().await.unwrap_err();

        assert!(err.is_step(StepId::new("a")));
        assert_eq!(*log.lock(), vec!["do:a"]);
    }

    #[tokio::test]
    async fn test_empty_saga_succeeds() {
        let saga = SagaOrchestrator::new("empty", Vec::new());
        saga.execute().await.unwrap();
        assert!(saga.step_ids().is_empty());
    }

    #[tokio::test]
    async fn test_executions_are_independent() {
        let log = Log::default();
        let saga = SagaOrchestrator::new(
            "twice",
            vec![
                recording_step("a", &log, false, false),
                recording_step("b", &log, true, false),
            ],
        );

        saga.execute().await.unwrap_err();
        saga.execute().await.unwrap_err();

        assert_eq!(
            *log.lock(),
            vec!["do:a", "do:b", "undo:a", "do:a", "do:b", "undo:a"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_durations_follow_the_runtime_clock() {
        let slow = SagaStep::new(
            StepId::new("slow"),
            || async {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok::<_, ServiceError>(())
            },
            || async { Ok::<_, ServiceError>(()) },
        );
        let saga = SagaOrchestrator::new("slow", vec![slow]);
        let started = Instant::now();

        saga.execute().await.unwrap();

        assert_eq!(started.elapsed(), std::time::Duration::from_secs(3600));
    }

    #[test]
    fn test_step_ids_in_order() {
        let log = Log::default();
        let saga = SagaOrchestrator::new(
            "ids",
            vec![
                recording_step("x", &log, false, false),
                recording_step("y", &log, false, false),
            ],
        );
        assert_eq!(saga.name(), "ids");
        assert_eq!(saga.step_ids(), vec![StepId::new("x"), StepId::new("y")]);
    }
}
