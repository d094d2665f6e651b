//! Dispatch engine — the workflow state-transition engine.
//!
//! Models a service request as a finite state machine keyed by the role
//! currently responsible for it, validates and executes role-to-role
//! transitions, records an immutable transition history, and coordinates
//! the notification and inventory side effects with the state change.
//!
//! Key invariants the engine maintains:
//!
//! - a request has exactly one owning role at any time
//! - every change to the owning role or status appends exactly one
//!   transition record; history only grows
//! - terminal statuses are absorbing
//! - state changes are all-or-nothing: forward operations are recorded with
//!   their inverses and rolled back in reverse order on failure
//!
//! Side-effect failures never roll back a committed transition:
//! notifications queue for retry with exponential backoff, and inventory
//! drift is repaired by the reconciliation sweep.
//!
//! `initiate_workflow` carries no idempotency/dedup key: a duplicate
//! submission creates a second request. Deduplication is the caller's
//! responsibility.

pub mod engine;
pub mod error;
pub mod inventory;
pub mod notify;
pub mod reconcile;
pub mod recovery;
pub mod retry;
pub mod txn;

#[cfg(test)]
pub(crate) mod testutil;

use serde::{Deserialize, Serialize};

pub use engine::{
    CompletionData, InitiateRequest, NotificationDisposition, TransitionOutcome, WorkflowEngine,
};
pub use error::{classify, classify_denial, AlertSink, EngineError, ErrorCategory, LogAlertSink, Severity};
pub use inventory::{
    ConsumptionRecord, InventoryError, InventoryManager, InventorySnapshot, MemoryInventory,
    StockLevel,
};
pub use notify::{
    role_receives_assignments, AssignmentNotification, HttpNotifier, LogNotifier,
    NotificationSender, NotifyError, RecordingNotifier,
};
pub use reconcile::{Discrepancy, DiscrepancyKind, ReconcilePolicy, ReconciliationReport};
pub use recovery::{RecoveryAction, RecoveryOption, StuckWorkflow};
pub use retry::{PendingNotification, RetryPolicy, RetryQueue, RetryReport};

/// Engine configuration. All knobs have compiled-in defaults; the CLI can
/// overlay values from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    /// A non-terminal request untouched for this long is "stuck".
    pub stuck_threshold_hours: u64,
    /// Bound on the notification retry queue.
    pub retry_queue_capacity: usize,
    pub reconcile: ReconcilePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            retry: RetryPolicy::default(),
            stuck_threshold_hours: 24,
            retry_queue_capacity: 256,
            reconcile: ReconcilePolicy::default(),
        }
    }
}
