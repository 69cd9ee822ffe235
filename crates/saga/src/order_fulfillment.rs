//! Order fulfillment saga definition.
//!
//! Create the order, deduct inventory, then take payment. A payment failure
//! returns the stock and cancels the order; an inventory failure only
//! cancels the order.

use std::sync::Arc;

use common::EntityId;
use resilience::{CallContext, InvokeError, ResilientInvoker};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::orchestrator::SagaOrchestrator;
use crate::services::{
    ChargeOperation, ChargeRequest, InventoryService, LineItem, OrderService, PaymentService,
};
use crate::step::{SagaStep, StepId};

/// Saga name used in logs and metric labels.
pub const SAGA_NAME: &str = "OrderFulfillment";

pub const CREATE_ORDER: StepId = StepId::new("create_order");
pub const DEDUCT_INVENTORY: StepId = StepId::new("deduct_inventory");
pub const PROCESS_PAYMENT: StepId = StepId::new("process_payment");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: EntityId,
    pub items: Vec<LineItem>,
    pub amount_cents: u64,
}

impl OrderRequest {
    /// Creates a request with a fresh order id.
    pub fn new(items: Vec<LineItem>, amount_cents: u64) -> Self {
        Self {
            order_id: EntityId::new(),
            items,
            amount_cents,
        }
    }
}

/// The collaborators an order fulfillment saga calls.
#[derive(Clone)]
pub struct OrderFulfillmentServices {
    pub orders: Arc<dyn OrderService>,
    pub inventory: Arc<dyn InventoryService>,
    pub payment: Arc<dyn PaymentService>,
    /// Guards the payment step. Share one invoker across sagas so they
    /// share its breaker.
    pub payment_invoker: Arc<ResilientInvoker>,
}

impl std::fmt::Debug for OrderFulfillmentServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderFulfillmentServices")
            .field("payment_invoker", &self.payment_invoker)
            .finish_non_exhaustive()
    }
}

/// Builds the saga for one order.
pub fn order_fulfillment_saga(
    request: OrderRequest,
    services: &OrderFulfillmentServices,
) -> SagaOrchestrator {
    let order_id = request.order_id;

    let create_order = {
        let orders = Arc::clone(&services.orders);
        let undo = Arc::clone(&services.orders);
        SagaStep::new(
            CREATE_ORDER,
            move || {
                let orders = Arc::clone(&orders);
                async move { orders.create_order(order_id).await }
            },
            move || {
                let orders = Arc::clone(&undo);
                async move { orders.cancel_order(order_id).await }
            },
        )
    };

    let deduct_inventory = {
        let inventory = Arc::clone(&services.inventory);
        let undo = Arc::clone(&services.inventory);
        let items = Arc::new(request.items);
        SagaStep::new(
            DEDUCT_INVENTORY,
            move || {
                let inventory = Arc::clone(&inventory);
                let items = Arc::clone(&items);
                async move { inventory.deduct_inventory(order_id, &items).await }
            },
            move || {
                let inventory = Arc::clone(&undo);
                async move { inventory.add_back_inventory(order_id).await }
            },
        )
    };

    let process_payment = {
        let invoker = Arc::clone(&services.payment_invoker);
        let charge = Arc::new(ChargeOperation::new(Arc::clone(&services.payment)));
        let undo = Arc::clone(&services.payment);
        let charge_request = ChargeRequest {
            order_id,
            amount_cents: request.amount_cents,
        };
        SagaStep::new(
            PROCESS_PAYMENT,
            move || {
                let invoker = Arc::clone(&invoker);
                let charge = Arc::clone(&charge);
                let charge_request = charge_request.clone();
                async move {
                    let result = invoker
                        .execute(&CallContext::background(), charge.as_ref(), &charge_request)
                        .await?;
                    tracing::info!(payment_id = %result.payment_id, "payment captured");
                    Ok::<_, InvokeError<ServiceError>>(())
                }
            },
            move || {
                let payment = Arc::clone(&undo);
                async move { payment.refund_payment(order_id).await }
            },
        )
    };

    SagaOrchestrator::new(
        SAGA_NAME,
        vec![create_order, deduct_inventory, process_payment],
    )
}
