//! Resilient invocation of unreliable external operations.
//!
//! This crate protects callers of a flaky remote operation with three
//! independent guards:
//! - [`FailureIsolationBreaker`] gates *admission*: it rejects calls outright
//!   while a dependency is known to be failing.
//! - [`RetryPolicy`] gates *persistence*: exponential backoff with jitter,
//!   bounded by a retry count and a total elapsed-time budget.
//! - A per-call deadline carried by [`CallContext`] gates *total duration*.
//!
//! [`ResilientInvoker`] composes the three around a single [`Operation`], and
//! [`AsyncExecutor`] runs invocations on independent tasks with a join barrier.
//!
//! Every outcome is reported as an [`InvokeError`] variant, so callers can tell
//! a rejected call from a timed-out one from an exhausted retry budget.

pub mod breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod invoker;
pub mod operation;
pub mod retry;

pub use breaker::{BreakerCounts, BreakerState, FailureIsolationBreaker, Permit};
pub use config::{BreakerConfig, InvokerConfig, RetryConfig};
pub use context::CallContext;
pub use error::{Classify, ConfigError, ErrorKind, InvokeError};
pub use executor::AsyncExecutor;
pub use invoker::ResilientInvoker;
pub use operation::Operation;
pub use retry::{RetryDecision, RetryPolicy};
