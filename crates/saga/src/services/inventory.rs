//! Inventory service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EntityId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// An item to take from stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

/// Trait for inventory management operations.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Removes the items from stock for the given order. All or nothing.
    async fn deduct_inventory(
        &self,
        order_id: EntityId,
        items: &[LineItem],
    ) -> Result<(), ServiceError>;

    /// Returns everything deducted for the order to stock.
    async fn add_back_inventory(&self, order_id: EntityId) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<String, u32>,
    deductions: HashMap<EntityId, Vec<LineItem>>,
    fail_on_add_back: bool,
}

/// In-memory inventory service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    /// Creates an inventory with no stock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory holding the given quantities.
    pub fn with_stock<I, S>(stock: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let service = Self::new();
        service.state.write().stock = stock
            .into_iter()
            .map(|(sku, quantity)| (sku.into(), quantity))
            .collect();
        service
    }

    /// Configures the service to fail when returning stock.
    pub fn set_fail_on_add_back(&self, fail: bool) {
        self.state.write().fail_on_add_back = fail;
    }

    pub fn stock_level(&self, sku: &str) -> u32 {
        self.state.read().stock.get(sku).copied().unwrap_or(0)
    }

    /// Returns true if stock is currently held for the order.
    pub fn has_deduction(&self, order_id: EntityId) -> bool {
        self.state.read().deductions.contains_key(&order_id)
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn deduct_inventory(
        &self,
        order_id: EntityId,
        items: &[LineItem],
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write();

        // Summed wide so duplicate lines cannot overflow.
        let mut requested: HashMap<&str, u64> = HashMap::new();
        for item in items {
            *requested.entry(item.sku.as_str()).or_default() += u64::from(item.quantity);
        }

        let mut deductions = Vec::with_capacity(requested.len());
        for (sku, total) in requested {
            let available = state
                .stock
                .get(sku)
                .copied()
                .ok_or_else(|| ServiceError::NotFound(format!("sku {sku}")))?;
            let quantity = u32::try_from(total)
                .ok()
                .filter(|quantity| *quantity <= available)
                .ok_or_else(|| ServiceError::InsufficientStock {
                    sku: sku.to_string(),
                    requested: u32::try_from(total).unwrap_or(u32::MAX),
                    available,
                })?;
            deductions.push((sku, quantity));
        }

        for (sku, quantity) in deductions {
            if let Some(level) = state.stock.get_mut(sku) {
                *level -= quantity;
            }
        }
        state
            .deductions
            .entry(order_id)
            .or_default()
            .extend(items.iter().cloned());
        Ok(())
    }

    async fn add_back_inventory(&self, order_id: EntityId) -> Result<(), ServiceError> {
        let mut state = self.state.write();

        if state.fail_on_add_back {
            return Err(ServiceError::Unavailable {
                service: "inventory",
            });
        }

        let items = state
            .deductions
            .remove(&order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("deduction for order {order_id}")))?;
        for item in items {
            let level = state.stock.entry(item.sku).or_default();
            *level = level.saturating_add(item.quantity);
        }
        Ok(())
    }
}
