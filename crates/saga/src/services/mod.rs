//! External service traits and in-memory implementations for saga steps.

pub mod inventory;
pub mod order;
pub mod payment;

pub use inventory::{InMemoryInventoryService, InventoryService, LineItem};
pub use order::{InMemoryOrderService, OrderService, OrderStatus};
pub use payment::{ChargeOperation, ChargeRequest, InMemoryPaymentService, PaymentResult, PaymentService};
