//! SMS delivery through an unreliable external provider.
//!
//! [`SmsService`] validates the message and sends it through a
//! [`resilience::ResilientInvoker`], so provider outages are retried with
//! backoff and a failing provider is isolated by the circuit breaker.
//! [`AsyncSmsService`] runs the same sends on background tasks and reports
//! each result through a callback.

pub mod client;
pub mod domain;
pub mod service;

pub use client::{ExternalSmsClient, MockSmsClient};
pub use domain::{Sms, SmsError};
pub use service::{AsyncSmsService, SendSmsOperation, SmsService};
