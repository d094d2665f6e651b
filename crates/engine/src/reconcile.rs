//! Inventory reconciliation sweep.
//!
//! Detects and (where safe) repairs bookkeeping drift between the
//! inventory manager and the request store:
//!
//! - **Negative stock** — material consumed beyond what was on hand. Small
//!   discrepancies are zeroed with a compensating adjustment; large ones
//!   are reported for an operator.
//! - **Orphaned consumption** — stock moved for a request that never got
//!   its `inventory_updated` flag (the flag flip after completion is
//!   best-effort). The sweep flips the flag.
//! - **Unknown consumer** — a consumption whose request id does not exist.
//!   Always report-only.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use dispatch_storage::RequestStore;

use crate::error::{EngineError, Severity};
use crate::inventory::InventoryManager;

/// Reconciliation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilePolicy {
    /// Negative-stock magnitude up to which the sweep auto-fixes; larger
    /// discrepancies are reported only.
    pub auto_fix_threshold: i64,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        ReconcilePolicy {
            auto_fix_threshold: 10,
        }
    }
}

/// One detected discrepancy.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscrepancyKind {
    NegativeStock { item: String, amount: i64 },
    OrphanedConsumption { request_id: String },
    UnknownConsumer { request_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    #[serde(flatten)]
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    pub fixed: bool,
    pub note: String,
}

/// Outcome of one reconciliation sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    pub discrepancies: Vec<Discrepancy>,
}

impl ReconciliationReport {
    pub fn fixed(&self) -> usize {
        self.discrepancies.iter().filter(|d| d.fixed).count()
    }

    pub fn reported(&self) -> usize {
        self.discrepancies.iter().filter(|d| !d.fixed).count()
    }

    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

impl std::fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Reconciliation: {} discrepancies ({} fixed, {} reported)",
            self.discrepancies.len(),
            self.fixed(),
            self.reported()
        )?;
        for d in &self.discrepancies {
            writeln!(
                f,
                "  [{}] {} — {}",
                if d.fixed { "fixed" } else { "reported" },
                match &d.kind {
                    DiscrepancyKind::NegativeStock { item, amount } =>
                        format!("negative stock {} (-{})", item, amount),
                    DiscrepancyKind::OrphanedConsumption { request_id } =>
                        format!("orphaned consumption for {}", request_id),
                    DiscrepancyKind::UnknownConsumer { request_id } =>
                        format!("consumption for unknown request {}", request_id),
                },
                d.note
            )?;
        }
        Ok(())
    }
}

/// Run one sweep over stock levels and consumption records.
pub async fn reconcile_inventory<S: RequestStore>(
    store: &S,
    inventory: &dyn InventoryManager,
    policy: &ReconcilePolicy,
    now: OffsetDateTime,
) -> Result<ReconciliationReport, EngineError> {
    let mut report = ReconciliationReport::default();

    // Negative stock.
    for level in inventory.stock_levels().await? {
        if level.on_hand >= 0 {
            continue;
        }
        let amount = -level.on_hand;
        if amount <= policy.auto_fix_threshold {
            inventory
                .adjust_stock(
                    &level.item,
                    amount,
                    "reconciliation: compensating adjustment for negative stock",
                )
                .await?;
            report.discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::NegativeStock {
                    item: level.item,
                    amount,
                },
                severity: Severity::Medium,
                fixed: true,
                note: "zeroed with compensating adjustment".to_string(),
            });
        } else {
            report.discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::NegativeStock {
                    item: level.item,
                    amount,
                },
                severity: Severity::High,
                fixed: false,
                note: format!(
                    "exceeds auto-fix threshold {}; operator review required",
                    policy.auto_fix_threshold
                ),
            });
        }
    }

    // Orphaned consumptions: inventory moved but the owning request never
    // marked `inventory_updated`.
    let consumers: BTreeSet<String> = inventory
        .consumptions()
        .await?
        .into_iter()
        .map(|c| c.request_id)
        .collect();
    for request_id in consumers {
        match store.get_request(&request_id).await? {
            Some(record) if !record.inventory_updated => {
                let version = record.version;
                let mut flagged = record;
                flagged.inventory_updated = true;
                flagged.updated_at = now;
                match store.update_request(flagged, version).await {
                    Ok(_) => report.discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::OrphanedConsumption {
                            request_id: request_id.clone(),
                        },
                        severity: Severity::Low,
                        fixed: true,
                        note: "inventory_updated flag set".to_string(),
                    }),
                    Err(e) => report.discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::OrphanedConsumption {
                            request_id: request_id.clone(),
                        },
                        severity: Severity::Medium,
                        fixed: false,
                        note: format!("flag update failed: {}", e),
                    }),
                }
            }
            Some(_) => {}
            None => report.discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::UnknownConsumer {
                    request_id: request_id.clone(),
                },
                severity: Severity::High,
                fixed: false,
                note: "consumption recorded for a request the store does not know".to_string(),
            }),
        }
    }

    if !report.is_clean() {
        tracing::info!(
            fixed = report.fixed(),
            reported = report.reported(),
            "inventory reconciliation sweep finished"
        );
    }
    Ok(report)
}
