//! The two demo scenarios: an async SMS batch and a pair of order sagas.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::EntityId;
use notification::{AsyncSmsService, MockSmsClient, Sms, SmsService};
use parking_lot::Mutex;
use resilience::{CallContext, InvokerConfig, ResilientInvoker};
use saga::{
    InMemoryInventoryService, InMemoryOrderService, InMemoryPaymentService, LineItem,
    OrderFulfillmentServices, OrderRequest, StepId, order_fulfillment_saga,
};

use crate::config::{Config, FailStep};
use crate::error::DemoError;

/// Outcome counts of an SMS batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub sent: usize,
    /// Failures keyed by [`resilience::ErrorKind`] name.
    pub failed: BTreeMap<&'static str, usize>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed.values().sum::<usize>()
    }
}

/// Sends `sms_batch_size` messages through the async service and waits for
/// all of them.
pub async fn run_sms_batch(config: &Config) -> Result<BatchReport, DemoError> {
    let client = Arc::new(MockSmsClient::new(config.sms_failure_rate));
    let service = SmsService::new(client, config.sms_max_retries, config.sms_timeout)?;
    let async_service = AsyncSmsService::new(&service);
    let report = Arc::new(Mutex::new(BatchReport::default()));

    for i in 0..config.sms_batch_size {
        let report = Arc::clone(&report);
        let sms = Sms::new(format!("+98912{i:07}"), format!("Your code is {:04}", i % 10_000));
        async_service.send_async(CallContext::background(), sms, move |result| {
            let mut report = report.lock();
            match result {
                Ok(()) => report.sent += 1,
                Err(e) => *report.failed.entry(e.kind().as_str()).or_default() += 1,
            }
        });
    }
    async_service.wait().await;

    let report = report.lock().clone();
    tracing::info!(
        sent = report.sent,
        failed = report.total() - report.sent,
        breaker = %service.breaker().state(),
        "sms batch finished"
    );
    Ok(report)
}

/// Result of one order saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaReport {
    pub order_id: EntityId,
    pub failed_step: Option<StepId>,
}

/// Runs one order saga that succeeds and one that fails at the configured
/// step and compensates.
pub async fn run_order_sagas(config: &Config) -> Result<Vec<SagaReport>, DemoError> {
    let orders = InMemoryOrderService::new();
    let inventory = InMemoryInventoryService::with_stock([("WIDGET", 10), ("GADGET", 4)]);
    let payment = InMemoryPaymentService::new();
    let invoker = ResilientInvoker::new(
        InvokerConfig::new(Duration::from_secs(2))
            .with_name("payment")
            .with_max_retries(3),
    )?;
    let services = OrderFulfillmentServices {
        orders: Arc::new(orders.clone()),
        inventory: Arc::new(inventory.clone()),
        payment: Arc::new(payment.clone()),
        payment_invoker: Arc::new(invoker),
    };

    let mut reports = Vec::with_capacity(2);
    for fail_step in [FailStep::None, config.saga_fail_step] {
        let mut items = vec![LineItem::new("WIDGET", 2), LineItem::new("GADGET", 1)];
        orders.set_fail_on_create(fail_step == FailStep::CreateOrder);
        payment.set_fail_on_charge(fail_step == FailStep::ProcessPayment);
        if fail_step == FailStep::DeductInventory {
            items.push(LineItem::new("GADGET", 100));
        }

        let request = OrderRequest::new(items, 4_999);
        let order_id = request.order_id;
        let failed_step = match order_fulfillment_saga(request, &services).execute().await {
            Ok(()) => {
                tracing::info!(%order_id, "order fulfilled");
                None
            }
            Err(e) => {
                tracing::warn!(%order_id, step = %e.step(), error = %e, "order saga failed");
                Some(e.step())
            }
        };
        reports.push(SagaReport {
            order_id,
            failed_step,
        });
    }

    tracing::info!(
        active_orders = orders.active_order_count(),
        payments = payment.payment_count(),
        widgets_left = inventory.stock_level("WIDGET"),
        "order sagas finished"
    );
    Ok(reports)
}
