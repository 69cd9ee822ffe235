//! Error taxonomy for resilient invocations.

use thiserror::Error;

/// Classifies an operation failure as worth retrying or not.
///
/// Implemented by the error type of every [`Operation`](crate::Operation).
/// Transient failures of an external dependency are retryable; malformed
/// input and other permanent rejections are terminal.
pub trait Classify {
    /// Returns true if another attempt may succeed.
    fn is_retryable(&self) -> bool;
}

/// The outcome of a failed [`ResilientInvoker`](crate::ResilientInvoker) call.
///
/// `E` is the operation's own error type. It is preserved in
/// `MaxRetriesExceeded` and `Terminal` so callers can match on their own
/// sentinel variants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvokeError<E> {
    /// Admission denied by the circuit breaker. No attempt was made.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The call deadline elapsed before a definitive result was obtained.
    #[error("deadline exceeded before the operation completed")]
    Timeout,

    /// The retry budget ran out while the operation kept failing retryably.
    #[error("max retries exceeded after {attempts} attempts: {last}")]
    MaxRetriesExceeded {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The failure returned by the final attempt.
        #[source]
        last: E,
    },

    /// The operation reported a non-retryable failure.
    #[error("operation failed: {0}")]
    Terminal(#[source] E),
}

/// Field-less discriminant of [`InvokeError`], convenient for metrics labels
/// and for comparing outcomes without caring about the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CircuitOpen,
    Timeout,
    MaxRetriesExceeded,
    TerminalOperationFailure,
}

impl ErrorKind {
    /// Returns the kind as a static label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MaxRetriesExceeded => "max_retries_exceeded",
            ErrorKind::TerminalOperationFailure => "terminal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<E> InvokeError<E> {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvokeError::CircuitOpen => ErrorKind::CircuitOpen,
            InvokeError::Timeout => ErrorKind::Timeout,
            InvokeError::MaxRetriesExceeded { .. } => ErrorKind::MaxRetriesExceeded,
            InvokeError::Terminal(_) => ErrorKind::TerminalOperationFailure,
        }
    }

    /// Returns the underlying operation failure, if one was observed.
    pub fn cause(&self) -> Option<&E> {
        match self {
            InvokeError::MaxRetriesExceeded { last, .. } => Some(last),
            InvokeError::Terminal(e) => Some(e),
            InvokeError::CircuitOpen | InvokeError::Timeout => None,
        }
    }

    /// Consumes the error and returns the underlying operation failure.
    pub fn into_cause(self) -> Option<E> {
        match self {
            InvokeError::MaxRetriesExceeded { last, .. } => Some(last),
            InvokeError::Terminal(e) => Some(e),
            InvokeError::CircuitOpen | InvokeError::Timeout => None,
        }
    }
}

/// Invalid invoker configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("breaker min_requests must be at least 1")]
    ZeroMinRequests,

    #[error("breaker failure_ratio_threshold must be in (0, 1], got {0}")]
    InvalidFailureRatio(f64),

    #[error("breaker half_open_trial_cap must be at least 1")]
    ZeroTrialCap,

    #[error("breaker half_open_successes_to_close must be at least 1")]
    ZeroSuccessesToClose,

    #[error("call timeout must be greater than zero")]
    ZeroTimeout,

    #[error("retry multiplier must be at least 1.0, got {0}")]
    InvalidMultiplier(f64),

    #[error("retry randomization_factor must be in [0, 1], got {0}")]
    InvalidRandomization(f64),
}
