//! Saga execution state machine.

use serde::{Deserialize, Serialize};

/// The state of one saga execution.
///
/// State transitions:
/// ```text
/// Pending ──► Running(0) ──► Running(1) ──► … ──┬──► Completed
///                  │              │             │
///                  └──────────────┴─────────────┴──► Compensating ──┬──► Compensated
///                                                                   └──► Failed
/// ```
///
/// `Failed` means at least one compensating action returned an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Execution has not started.
    #[default]
    Pending,

    /// The forward action of the step at this index is running.
    Running { step: usize },

    /// The step at this index failed and completed steps are being undone.
    Compensating { failed_step: usize },

    /// Every forward action succeeded (terminal state).
    Completed,

    /// Every compensation succeeded after a failure (terminal state).
    Compensated,

    /// At least one compensation failed (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaState::Completed | SagaState::Compensated | SagaState::Failed
        )
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        match (self, next) {
            (SagaState::Pending, SagaState::Running { step }) => step == 0,
            (SagaState::Pending, SagaState::Completed) => true,
            (SagaState::Running { step }, SagaState::Running { step: next }) => next == step + 1,
            (SagaState::Running { .. }, SagaState::Completed) => true,
            (SagaState::Running { step }, SagaState::Compensating { failed_step }) => {
                failed_step == *step
            }
            (SagaState::Compensating { .. }, SagaState::Compensated | SagaState::Failed) => true,
            _ => false,
        }
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Pending => "Pending",
            SagaState::Running { .. } => "Running",
            SagaState::Compensating { .. } => "Compensating",
            SagaState::Completed => "Completed",
            SagaState::Compensated => "Compensated",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
