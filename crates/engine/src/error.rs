//! Engine failures, the category × severity taxonomy, and critical alerts.
//!
//! Expected business denials are not here — they travel as values (see
//! [`dispatch_core::Denial`] and `TransitionOutcome::Denied`). This module
//! covers the failures: infrastructure, transaction, inventory and
//! notification errors, each classified on two orthogonal axes so the
//! caller can decide between auto-retry, queueing, and surfacing.

use std::fmt;

use serde::{Deserialize, Serialize};

use dispatch_core::{Denial, Role, WorkflowKind};
use dispatch_storage::StorageError;

use crate::inventory::InventoryError;
use crate::txn::TxnFailure;

// ──────────────────────────────────────────────
// Error type
// ──────────────────────────────────────────────

/// A failed engine operation.
#[derive(Debug)]
pub enum EngineError {
    /// The request id does not exist.
    RequestNotFound { request_id: String },
    /// A staff-supplied initial-role override is not a step of the
    /// workflow.
    InvalidInitialRole { role: Role, workflow: WorkflowKind },
    /// The request store failed outside a transaction.
    Storage(StorageError),
    /// A transactional state change failed; `rolled_back` tells whether the
    /// inverse operations all applied.
    Transaction(TxnFailure),
    /// The inventory collaborator failed.
    Inventory(InventoryError),
    /// A notification could not be dispatched or queued.
    Notification { message: String },
    /// The bounded retry queue is full; the notification was dropped.
    RetryQueueFull { capacity: usize },
    /// The requested admin recovery does not apply to this request.
    RecoveryNotApplicable { request_id: String, reason: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::RequestNotFound { request_id } => {
                write!(f, "request not found: {}", request_id)
            }
            EngineError::InvalidInitialRole { role, workflow } => {
                write!(
                    f,
                    "role '{}' is not a step of workflow '{}'",
                    role, workflow
                )
            }
            EngineError::Storage(e) => write!(f, "storage error: {}", e),
            EngineError::Transaction(e) => write!(f, "transaction failed: {}", e),
            EngineError::Inventory(e) => write!(f, "inventory error: {}", e),
            EngineError::Notification { message } => {
                write!(f, "notification error: {}", message)
            }
            EngineError::RetryQueueFull { capacity } => {
                write!(f, "notification retry queue full (capacity {})", capacity)
            }
            EngineError::RecoveryNotApplicable { request_id, reason } => {
                write!(f, "recovery not applicable to {}: {}", request_id, reason)
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(e) => Some(e),
            EngineError::Transaction(e) => Some(e),
            EngineError::Inventory(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}

impl From<TxnFailure> for EngineError {
    fn from(e: TxnFailure) -> Self {
        EngineError::Transaction(e)
    }
}

impl From<InventoryError> for EngineError {
    fn from(e: InventoryError) -> Self {
        EngineError::Inventory(e)
    }
}

// ──────────────────────────────────────────────
// Classification
// ──────────────────────────────────────────────

/// What kind of failure this is; decides the handling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network/store timeouts; auto-retryable.
    Transient,
    /// Validation and missing-field problems; needs user correction,
    /// never retried.
    Data,
    /// Permission and invalid-transition problems; never retried.
    BusinessLogic,
    /// Store corruption or unavailability; needs an operator.
    System,
    /// Stock discrepancies; reconcilable.
    Inventory,
    /// Delivery failures; retryable and never transition-blocking.
    Notification,
}

/// How bad it is. `Critical` fires the alert sink.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Classify a failure on the category × severity axes.
pub fn classify(error: &EngineError) -> (ErrorCategory, Severity) {
    match error {
        EngineError::RequestNotFound { .. } => (ErrorCategory::Data, Severity::Low),
        EngineError::InvalidInitialRole { .. } => (ErrorCategory::Data, Severity::Low),
        EngineError::Storage(e) => classify_storage(e),
        EngineError::Transaction(f) => {
            if f.rolled_back {
                (ErrorCategory::System, Severity::High)
            } else {
                // Partial rollback: the store may hold a torn write.
                (ErrorCategory::System, Severity::Critical)
            }
        }
        EngineError::Inventory(_) => (ErrorCategory::Inventory, Severity::Medium),
        EngineError::Notification { .. } => (ErrorCategory::Notification, Severity::Low),
        EngineError::RetryQueueFull { .. } => (ErrorCategory::Notification, Severity::High),
        EngineError::RecoveryNotApplicable { .. } => {
            (ErrorCategory::BusinessLogic, Severity::Low)
        }
    }
}

fn classify_storage(error: &StorageError) -> (ErrorCategory, Severity) {
    match error {
        StorageError::Unavailable(_) => (ErrorCategory::Transient, Severity::High),
        StorageError::ConcurrentConflict { .. } => (ErrorCategory::Transient, Severity::Medium),
        StorageError::Backend(_) => (ErrorCategory::System, Severity::Critical),
        StorageError::RequestNotFound { .. }
        | StorageError::AlreadyExists { .. }
        | StorageError::TransitionNotFound { .. } => (ErrorCategory::Data, Severity::Medium),
    }
}

/// Classify an expected business denial. Denials are always low severity;
/// missing data is the user's to correct, the rest is business logic.
pub fn classify_denial(denial: &Denial) -> (ErrorCategory, Severity) {
    match denial {
        Denial::MissingData { .. } => (ErrorCategory::Data, Severity::Low),
        _ => (ErrorCategory::BusinessLogic, Severity::Low),
    }
}

// ──────────────────────────────────────────────
// Alerts
// ──────────────────────────────────────────────

/// Receives critical failures. The default sink logs; deployments plug in
/// a pager or chat hook.
pub trait AlertSink: Send + Sync {
    fn critical_alert(&self, context: &str, error: &EngineError);
}

/// Alert sink that emits a structured error event.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn critical_alert(&self, context: &str, error: &EngineError) {
        tracing::error!(target: "dispatch::alert", context, error = %error, "critical failure");
    }
}
