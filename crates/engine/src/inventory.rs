//! Inventory collaborator contract and the in-memory reference manager.
//!
//! The engine reserves equipment when a transition carries equipment lines
//! and consumes the reservation when the request completes. Bookkeeping
//! drift (negative stock, consumption without the owning request's
//! `inventory_updated` flag) is repaired by the reconciliation sweep, not
//! resolved synchronously.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use dispatch_core::EquipmentLine;

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

/// Current stock of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub item: String,
    pub on_hand: i64,
    pub reserved: i64,
}

impl StockLevel {
    /// Stock not currently held by a reservation.
    pub fn available(&self) -> i64 {
        self.on_hand - self.reserved
    }
}

/// A recorded consumption tied to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub request_id: String,
    pub item: String,
    pub quantity: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

/// Errors from an inventory manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    UnknownItem { item: String },
    Backend { message: String },
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryError::UnknownItem { item } => write!(f, "unknown stock item: {}", item),
            InventoryError::Backend { message } => {
                write!(f, "inventory backend error: {}", message)
            }
        }
    }
}

impl std::error::Error for InventoryError {}

// ──────────────────────────────────────────────
// Contract
// ──────────────────────────────────────────────

/// Stock operations the engine and the reconciliation sweep need.
#[async_trait]
pub trait InventoryManager: Send + Sync {
    /// Reserve the listed quantities for a request. All-or-nothing:
    /// `Ok(false)` if any line lacks available stock, with nothing
    /// reserved.
    async fn reserve_equipment(
        &self,
        request_id: &str,
        lines: &[EquipmentLine],
    ) -> Result<bool, InventoryError>;

    /// Consume previously reserved stock and record the consumption.
    /// Quantities beyond the reservation still consume — the resulting
    /// drift is a reconciliation concern.
    async fn consume_reserved(
        &self,
        request_id: &str,
        lines: &[EquipmentLine],
        now: OffsetDateTime,
    ) -> Result<bool, InventoryError>;

    /// Current stock levels for every known item.
    async fn stock_levels(&self) -> Result<Vec<StockLevel>, InventoryError>;

    /// Apply a manual/compensating adjustment to one item's on-hand count.
    async fn adjust_stock(
        &self,
        item: &str,
        delta: i64,
        reason: &str,
    ) -> Result<(), InventoryError>;

    /// All recorded consumptions.
    async fn consumptions(&self) -> Result<Vec<ConsumptionRecord>, InventoryError>;
}

// ──────────────────────────────────────────────
// In-memory manager
// ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct InventoryState {
    stock: BTreeMap<String, StockLevel>,
    consumptions: Vec<ConsumptionRecord>,
}

/// Serializable dump of a [`MemoryInventory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub stock: Vec<StockLevel>,
    pub consumptions: Vec<ConsumptionRecord>,
}

/// In-memory [`InventoryManager`] for tests and the CLI snapshot store.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    inner: Mutex<InventoryState>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        MemoryInventory::default()
    }

    /// Add stock for an item, creating it if needed.
    pub fn seed_stock(&self, item: impl Into<String>, on_hand: i64) {
        let item = item.into();
        let mut inner = self.inner.lock().expect("inventory poisoned");
        let level = inner.stock.entry(item.clone()).or_insert(StockLevel {
            item,
            on_hand: 0,
            reserved: 0,
        });
        level.on_hand += on_hand;
    }

    /// Overwrite an item's counts directly. Test/reconciliation fixture.
    pub fn force_stock(&self, item: impl Into<String>, on_hand: i64, reserved: i64) {
        let item = item.into();
        let mut inner = self.inner.lock().expect("inventory poisoned");
        inner.stock.insert(
            item.clone(),
            StockLevel {
                item,
                on_hand,
                reserved,
            },
        );
    }

    /// Record a consumption without touching stock. Test/reconciliation
    /// fixture for orphaned-consumption scenarios.
    pub fn force_consumption(&self, record: ConsumptionRecord) {
        let mut inner = self.inner.lock().expect("inventory poisoned");
        inner.consumptions.push(record);
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        let inner = self.inner.lock().expect("inventory poisoned");
        InventorySnapshot {
            stock: inner.stock.values().cloned().collect(),
            consumptions: inner.consumptions.clone(),
        }
    }

    pub fn from_snapshot(snapshot: InventorySnapshot) -> Self {
        let mut state = InventoryState::default();
        for level in snapshot.stock {
            state.stock.insert(level.item.clone(), level);
        }
        state.consumptions = snapshot.consumptions;
        MemoryInventory {
            inner: Mutex::new(state),
        }
    }
}

#[async_trait]
impl InventoryManager for MemoryInventory {
    async fn reserve_equipment(
        &self,
        request_id: &str,
        lines: &[EquipmentLine],
    ) -> Result<bool, InventoryError> {
        let mut inner = self.inner.lock().expect("inventory poisoned");
        for line in lines {
            let level =
                inner
                    .stock
                    .get(&line.item)
                    .ok_or_else(|| InventoryError::UnknownItem {
                        item: line.item.clone(),
                    })?;
            if level.available() < line.quantity as i64 {
                tracing::warn!(
                    request_id,
                    item = %line.item,
                    requested = line.quantity,
                    available = level.available(),
                    "insufficient stock for reservation"
                );
                return Ok(false);
            }
        }
        for line in lines {
            if let Some(level) = inner.stock.get_mut(&line.item) {
                level.reserved += line.quantity as i64;
            }
        }
        Ok(true)
    }

    async fn consume_reserved(
        &self,
        request_id: &str,
        lines: &[EquipmentLine],
        now: OffsetDateTime,
    ) -> Result<bool, InventoryError> {
        let mut inner = self.inner.lock().expect("inventory poisoned");
        for line in lines {
            let level =
                inner
                    .stock
                    .get_mut(&line.item)
                    .ok_or_else(|| InventoryError::UnknownItem {
                        item: line.item.clone(),
                    })?;
            let quantity = line.quantity as i64;
            level.on_hand -= quantity;
            level.reserved = (level.reserved - quantity).max(0);
            inner.consumptions.push(ConsumptionRecord {
                request_id: request_id.to_string(),
                item: line.item.clone(),
                quantity,
                at: now,
            });
        }
        Ok(true)
    }

    async fn stock_levels(&self) -> Result<Vec<StockLevel>, InventoryError> {
        let inner = self.inner.lock().expect("inventory poisoned");
        Ok(inner.stock.values().cloned().collect())
    }

    async fn adjust_stock(
        &self,
        item: &str,
        delta: i64,
        reason: &str,
    ) -> Result<(), InventoryError> {
        let mut inner = self.inner.lock().expect("inventory poisoned");
        let level = inner
            .stock
            .get_mut(item)
            .ok_or_else(|| InventoryError::UnknownItem {
                item: item.to_string(),
            })?;
        level.on_hand += delta;
        tracing::info!(item, delta, reason, "stock adjustment");
        Ok(())
    }

    async fn consumptions(&self) -> Result<Vec<ConsumptionRecord>, InventoryError> {
        let inner = self.inner.lock().expect("inventory poisoned");
        Ok(inner.consumptions.clone())
    }
}
