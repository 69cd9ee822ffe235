//! Order service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EntityId;
use parking_lot::RwLock;

use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Created,
    Cancelled,
}

/// Trait for order lifecycle operations.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Records a new order.
    async fn create_order(&self, order_id: EntityId) -> Result<(), ServiceError>;

    /// Cancels a previously created order.
    async fn cancel_order(&self, order_id: EntityId) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderState {
    orders: HashMap<EntityId, OrderStatus>,
    fail_on_create: bool,
    fail_on_cancel: bool,
}

/// In-memory order service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderService {
    state: Arc<RwLock<InMemoryOrderState>>,
}

impl InMemoryOrderService {
    /// Creates a new in-memory order service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to reject new orders.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().fail_on_create = fail;
    }

    /// Configures the service to fail cancellations.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().fail_on_cancel = fail;
    }

    pub fn status(&self, order_id: EntityId) -> Option<OrderStatus> {
        self.state.read().orders.get(&order_id).copied()
    }

    /// Returns the number of orders that are not cancelled.
    pub fn active_order_count(&self) -> usize {
        self.state
            .read()
            .orders
            .values()
            .filter(|status| **status == OrderStatus::Created)
            .count()
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn create_order(&self, order_id: EntityId) -> Result<(), ServiceError> {
        let mut state = self.state.write();

        if state.fail_on_create {
            return Err(ServiceError::OrderRejected(
                "order service refused the order".to_string(),
            ));
        }
        if state.orders.contains_key(&order_id) {
            return Err(ServiceError::OrderRejected(format!(
                "order {order_id} already exists"
            )));
        }

        state.orders.insert(order_id, OrderStatus::Created);
        Ok(())
    }

    async fn cancel_order(&self, order_id: EntityId) -> Result<(), ServiceError> {
        let mut state = self.state.write();

        if state.fail_on_cancel {
            return Err(ServiceError::Unavailable { service: "order" });
        }

        let status = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))?;
        *status = OrderStatus::Cancelled;
        Ok(())
    }
}
