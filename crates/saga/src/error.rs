//! Saga error types.

use resilience::Classify;
use thiserror::Error;

use crate::step::StepId;

/// Type-erased error produced by a step's forward or compensating action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error returned by [`SagaOrchestrator::execute`](crate::SagaOrchestrator::execute).
#[derive(Debug, Error)]
pub enum SagaError {
    /// A forward action failed. Compensation has already run by the time
    /// this is returned.
    #[error("Saga step '{step}' failed: {source}")]
    StepFailed {
        step: StepId,
        #[source]
        source: BoxError,
    },
}

impl SagaError {
    /// The step whose forward action failed.
    pub fn step(&self) -> StepId {
        match self {
            SagaError::StepFailed { step, .. } => *step,
        }
    }

    /// Returns true if the failure happened in `step`.
    pub fn is_step(&self, step: StepId) -> bool {
        self.step() == step
    }

    /// The error the forward action returned.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            SagaError::StepFailed { source, .. } => source.as_ref(),
        }
    }

    /// Downcasts the cause to a concrete error type.
    pub fn cause_as<T: std::error::Error + 'static>(&self) -> Option<&T> {
        self.cause().downcast_ref::<T>()
    }
}

/// Errors raised by the order, inventory and payment services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: String,
        requested: u32,
        available: u32,
    },

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// Transient outage; worth retrying.
    #[error("{service} service unavailable")]
    Unavailable { service: &'static str },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Classify for ServiceError {
    fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVE: StepId = StepId::new("reserve");

    #[test]
    fn test_step_failed_exposes_step_and_cause() {
        let err = SagaError::StepFailed {
            step: RESERVE,
            source: Box::new(ServiceError::NotFound("SKU-9".into())),
        };

        assert!(err.is_step(RESERVE));
        assert!(!err.is_step(StepId::new("charge")));
        assert_eq!(err.step(), RESERVE);
        assert_eq!(
            err.cause_as::<ServiceError>(),
            Some(&ServiceError::NotFound("SKU-9".into()))
        );
        assert!(err.cause_as::<std::fmt::Error>().is_none());
        assert_eq!(err.to_string(), "Saga step 'reserve' failed: Not found: SKU-9");
    }

    #[test]
    fn test_source_chain_reaches_cause() {
        use std::error::Error as _;

        let err = SagaError::StepFailed {
            step: RESERVE,
            source: Box::new(ServiceError::PaymentDeclined("card expired".into())),
        };
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "Payment declined: card expired");
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(ServiceError::Unavailable { service: "payment" }.is_retryable());
        assert!(!ServiceError::PaymentDeclined("no".into()).is_retryable());
        assert!(!ServiceError::OrderRejected("no".into()).is_retryable());
        assert!(
            !ServiceError::InsufficientStock {
                sku: "A".into(),
                requested: 2,
                available: 1
            }
            .is_retryable()
        );
    }
}
