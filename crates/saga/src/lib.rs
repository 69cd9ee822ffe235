//! Saga pattern implementation for multi-step business workflows.
//!
//! A [`SagaOrchestrator`] runs an ordered list of [`SagaStep`]s. Each step
//! pairs a forward action with a compensating action. When a forward action
//! fails, the compensations of every step that already succeeded run in
//! reverse order, and the orchestrator returns [`SagaError::StepFailed`]
//! naming the failed step and carrying its cause.
//!
//! Compensation failures never reach the caller. They are reported to a
//! [`CompensationObserver`] (by default [`TracingObserver`], which logs them)
//! and the unwind always continues.
//!
//! The order fulfillment saga follows these steps:
//! 1. Create order
//! 2. Deduct inventory
//! 3. Process payment (through a [`resilience::ResilientInvoker`])
//!
//! Executions are in-memory only; nothing is persisted or recovered.

pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod order_fulfillment;
pub mod services;
pub mod state;
pub mod step;

pub use error::{BoxError, SagaError, ServiceError};
pub use observer::{CompensationFailure, CompensationObserver, TracingObserver};
pub use orchestrator::SagaOrchestrator;
pub use order_fulfillment::{
    CREATE_ORDER, DEDUCT_INVENTORY, OrderFulfillmentServices, OrderRequest, PROCESS_PAYMENT,
    order_fulfillment_saga,
};
pub use services::{
    ChargeOperation, ChargeRequest, InMemoryInventoryService, InMemoryOrderService,
    InMemoryPaymentService, InventoryService, LineItem, OrderService, OrderStatus, PaymentResult,
    PaymentService,
};
pub use state::SagaState;
pub use step::{SagaStep, StepId};
