//! Payment service trait, in-memory implementation, and the resilient
//! charge operation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EntityId;
use parking_lot::RwLock;
use resilience::{CallContext, Operation};

use crate::error::ServiceError;

/// Result of a successful payment charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    /// The payment ID assigned by the payment service.
    pub payment_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub order_id: EntityId,
    pub amount_cents: u64,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the order amount.
    async fn process_payment(&self, request: &ChargeRequest) -> Result<PaymentResult, ServiceError>;

    /// Refunds the payment taken for an order.
    async fn refund_payment(&self, order_id: EntityId) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<EntityId, (String, u64)>,
    next_id: u32,
    charge_attempts: u32,
    fail_on_charge: bool,
    unavailable_for: u32,
}

/// In-memory payment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to decline charges.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().fail_on_charge = fail;
    }

    /// Makes the next `calls` charge attempts fail as a transient outage.
    pub fn set_unavailable_for(&self, calls: u32) {
        self.state.write().unavailable_for = calls;
    }

    /// Returns the number of charge attempts, including failed ones.
    pub fn charge_attempts(&self) -> u32 {
        self.state.read().charge_attempts
    }

    /// Returns the number of payments not refunded.
    pub fn payment_count(&self) -> usize {
        self.state.read().payments.len()
    }

    pub fn has_payment_for(&self, order_id: EntityId) -> bool {
        self.state.read().payments.contains_key(&order_id)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn process_payment(&self, request: &ChargeRequest) -> Result<PaymentResult, ServiceError> {
        let mut state = self.state.write();
        state.charge_attempts += 1;

        if state.unavailable_for > 0 {
            state.unavailable_for -= 1;
            return Err(ServiceError::Unavailable { service: "payment" });
        }
        if state.fail_on_charge {
            return Err(ServiceError::PaymentDeclined("card declined".to_string()));
        }
        if request.amount_cents == 0 {
            return Err(ServiceError::PaymentDeclined(
                "amount must be positive".to_string(),
            ));
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state
            .payments
            .insert(request.order_id, (payment_id.clone(), request.amount_cents));

        Ok(PaymentResult { payment_id })
    }

    async fn refund_payment(&self, order_id: EntityId) -> Result<(), ServiceError> {
        self.state
            .write()
            .payments
            .remove(&order_id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("payment for order {order_id}")))
    }
}

/// Adapts a [`PaymentService`] charge to the resilient invoker, so transient
/// outages are retried behind a breaker.
#[derive(Clone)]
pub struct ChargeOperation {
    payment: Arc<dyn PaymentService>,
}

impl ChargeOperation {
    pub fn new(payment: Arc<dyn PaymentService>) -> Self {
        Self { payment }
    }
}

impl std::fmt::Debug for ChargeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargeOperation").finish_non_exhaustive()
    }
}

#[async_trait]
impl Operation for ChargeOperation {
    type Payload = ChargeRequest;
    type Output = PaymentResult;
    type Error = ServiceError;

    async fn invoke(
        &self,
        _ctx: &CallContext,
        payload: &ChargeRequest,
    ) -> Result<PaymentResult, ServiceError> {
        self.payment.process_payment(payload).await
    }
}
