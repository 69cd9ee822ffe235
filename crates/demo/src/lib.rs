//! Demo wiring for the resilience, saga and notification crates.
//!
//! Runs a batch of asynchronous SMS sends against a flaky mock provider and
//! a pair of order fulfillment sagas, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod scenarios;
