//! The workflow engine: initiate, transition, and complete service
//! requests.
//!
//! Every state change runs through the same shape: load → validate against
//! the workflow definition → build the updated record and its transition
//! entry → commit both through a compensating transaction → dispatch side
//! effects. Side effects come strictly after the commit and never undo it.
//!
//! Operations on the same request are serialized through a per-request
//! async lock, so "read current state, then write new state" cannot
//! interleave; the store's OCC version remains as a backstop against
//! out-of-band writers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;

use dispatch_core::{
    validate_transition, Action, CreationSource, Denial, Priority, RequestStatus, Role,
    StateData, TransitionData, WorkflowDefinition, WorkflowKind, WorkflowRegistry,
};
use dispatch_storage::{RequestRecord, RequestStore, TransitionRecord};

use crate::error::{classify, AlertSink, EngineError, LogAlertSink, Severity};
use crate::inventory::InventoryManager;
use crate::notify::{role_receives_assignments, AssignmentNotification, NotificationSender};
use crate::reconcile::{reconcile_inventory, ReconciliationReport};
use crate::retry::{PendingNotification, RetryQueue, RetryReport};
use crate::txn::StateTransaction;
use crate::EngineConfig;

#[cfg(test)]
mod tests;

// ──────────────────────────────────────────────
// Operation inputs and outcomes
// ──────────────────────────────────────────────

/// Input to `initiate_workflow`.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub workflow: WorkflowKind,
    pub client_id: String,
    pub description: Option<String>,
    pub priority: Priority,
    /// Staff override: start with this role instead of the definition's
    /// initial role (e.g. call-center-created requests start at manager).
    pub initial_role: Option<Role>,
    pub created_by_staff: bool,
    pub staff_creator_id: Option<String>,
    pub staff_creator_role: Option<Role>,
    /// Seed working data (call notes, address, tariff...).
    pub state_data: StateData,
}

impl InitiateRequest {
    pub fn new(workflow: WorkflowKind, client_id: impl Into<String>) -> Self {
        InitiateRequest {
            workflow,
            client_id: client_id.into(),
            description: None,
            priority: Priority::default(),
            initial_role: None,
            created_by_staff: false,
            staff_creator_id: None,
            staff_creator_role: None,
            state_data: StateData::new(),
        }
    }
}

/// Input to `complete_workflow`.
#[derive(Debug, Clone, Default)]
pub struct CompletionData {
    pub rating: Option<u8>,
    pub comments: Option<String>,
    pub actor_id: String,
}

/// What happened to the assignment notification after a role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationDisposition {
    /// The transition did not change the owning role.
    NotRequired,
    /// The new owner is on the exemption list (client, admin).
    Excluded,
    Delivered,
    /// Delivery failed; a retry is queued.
    Queued,
    /// Delivery failed and the retry queue was full.
    Dropped,
}

/// Result of a transition or completion attempt.
///
/// Denials are ordinary outcomes: the caller shows "not allowed" and moves
/// on. Only infrastructure failures surface as `EngineError`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        request_id: String,
        /// New owning role when the action handed the request off.
        next_role: Option<Role>,
        notification: NotificationDisposition,
    },
    Denied(Denial),
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, TransitionOutcome::Denied(_))
    }
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

/// The workflow engine. Holds the definition registry and the collaborator
/// handles; all request state lives in the store.
pub struct WorkflowEngine<S: RequestStore> {
    registry: WorkflowRegistry,
    store: S,
    notifier: Arc<dyn NotificationSender>,
    inventory: Arc<dyn InventoryManager>,
    alerts: Arc<dyn AlertSink>,
    config: EngineConfig,
    retry_queue: StdMutex<RetryQueue>,
    request_locks: StdMutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: RequestStore> WorkflowEngine<S> {
    pub fn new(
        store: S,
        notifier: Arc<dyn NotificationSender>,
        inventory: Arc<dyn InventoryManager>,
    ) -> Self {
        let config = EngineConfig::default();
        WorkflowEngine {
            registry: WorkflowRegistry::builtin(),
            store,
            notifier,
            inventory,
            alerts: Arc::new(LogAlertSink),
            retry_queue: StdMutex::new(RetryQueue::new(config.retry_queue_capacity)),
            config,
            request_locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.retry_queue = StdMutex::new(RetryQueue::new(config.retry_queue_capacity));
        self.config = config;
        self
    }

    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The workflow definition for a kind.
    pub fn get_workflow_definition(&self, kind: WorkflowKind) -> &WorkflowDefinition {
        self.registry.get(kind)
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    // ── Exposed operations ───────────────────────────────────────────────

    /// Create a new request and its synthetic "created" history entry.
    ///
    /// Returns the new request id. There is no dedup key: submitting twice
    /// creates two requests.
    pub async fn initiate_workflow(
        &self,
        request: InitiateRequest,
    ) -> Result<String, EngineError> {
        let definition = self.registry.get(request.workflow);
        let role = match request.initial_role {
            Some(role) => {
                if !definition.contains_role(role) {
                    return Err(self.raise(
                        "initiate_workflow",
                        EngineError::InvalidInitialRole {
                            role,
                            workflow: request.workflow,
                        },
                    ));
                }
                role
            }
            None => definition.initial_role,
        };

        let now = OffsetDateTime::now_utc();
        let request_id = generate_request_id();
        let actor_id = request
            .staff_creator_id
            .clone()
            .unwrap_or_else(|| request.client_id.clone());

        let mut state_data = request.state_data;
        if let Some(ref description) = request.description {
            state_data.insert(
                "description",
                serde_json::Value::String(description.clone()),
            );
        }

        let record = RequestRecord {
            id: request_id.clone(),
            workflow: request.workflow,
            client_id: request.client_id,
            role_current: role,
            status: RequestStatus::Created,
            priority: request.priority,
            state_data,
            equipment_used: Vec::new(),
            inventory_updated: false,
            created_by_staff: request.created_by_staff,
            staff_creator_id: request.staff_creator_id,
            staff_creator_role: request.staff_creator_role,
            creation_source: if request.created_by_staff {
                CreationSource::StaffOnBehalf
            } else {
                CreationSource::ClientSelfService
            },
            completion_rating: None,
            feedback_comments: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let created = TransitionRecord {
            id: generate_transition_id(),
            request_id: request_id.clone(),
            seq: 0,
            from_role: None,
            to_role: role,
            action: Action::Create,
            actor_id,
            transition_data: TransitionData::new(),
            comments: None,
            created_at: now,
        };

        let mut txn = StateTransaction::new();
        txn.create(record).append(created);
        txn.commit(&self.store)
            .await
            .map_err(|f| self.raise("initiate_workflow", EngineError::Transaction(f)))?;

        tracing::info!(
            request_id = %request_id,
            workflow = %request.workflow,
            role = %role,
            "workflow initiated"
        );
        Ok(request_id)
    }

    /// Execute one transition: validate, persist the new state with its
    /// history entry, then dispatch the assignment notification if the
    /// owning role changed.
    pub async fn transition_workflow(
        &self,
        request_id: &str,
        action: Action,
        actor_role: Role,
        actor_id: &str,
        data: TransitionData,
    ) -> Result<TransitionOutcome, EngineError> {
        let lock = self.request_lock(request_id);
        let _guard = lock.lock().await;

        let before = self.load(request_id).await?;
        let definition = self.registry.get(before.workflow);

        let next_role = match validate_transition(
            definition,
            before.status,
            before.role_current,
            action,
            actor_role,
            &before.state_data,
            &data,
        ) {
            Ok(next_role) => next_role,
            Err(denial) => {
                tracing::debug!(request_id, action = %action, %denial, "transition denied");
                return Ok(TransitionOutcome::Denied(denial));
            }
        };

        let now = OffsetDateTime::now_utc();
        let mut after = before.clone();
        data.apply_to(&mut after.state_data);
        after.equipment_used.extend(data.equipment.iter().cloned());
        if action == Action::CancelRequest {
            after.status = RequestStatus::Cancelled;
        } else if after.status == RequestStatus::Created {
            after.status = RequestStatus::InProgress;
        }
        if let Some(role) = next_role {
            after.role_current = role;
        }
        after.updated_at = now;

        let transition = TransitionRecord {
            id: generate_transition_id(),
            request_id: request_id.to_string(),
            seq: 0,
            from_role: Some(before.role_current),
            to_role: after.role_current,
            action,
            actor_id: actor_id.to_string(),
            transition_data: data.clone(),
            comments: data.comments.clone(),
            created_at: now,
        };

        let mut txn = StateTransaction::new();
        txn.update(before.clone(), after).append(transition);
        txn.commit(&self.store)
            .await
            .map_err(|f| self.raise("transition_workflow", EngineError::Transaction(f)))?;

        tracing::info!(
            request_id,
            action = %action,
            from = %before.role_current,
            to = ?next_role,
            "transition applied"
        );

        // Side effects only after the committed transition. Reservation is
        // tied to the equipment request; issuing already-reserved stock
        // must not reserve again.
        if action == Action::RequestEquipment && !data.equipment.is_empty() {
            self.reserve_equipment(request_id, &data.equipment).await;
        }

        let notification = match next_role {
            Some(role) => {
                self.dispatch_assignment(role, request_id, before.workflow, now)
                    .await
            }
            None => NotificationDisposition::NotRequired,
        };

        Ok(TransitionOutcome::Applied {
            request_id: request_id.to_string(),
            next_role,
            notification,
        })
    }

    /// Close a request through the happy path: record rating/feedback, set
    /// the terminal `Completed` status, and consume reserved equipment.
    pub async fn complete_workflow(
        &self,
        request_id: &str,
        completion: CompletionData,
    ) -> Result<TransitionOutcome, EngineError> {
        let lock = self.request_lock(request_id);
        let _guard = lock.lock().await;

        let before = self.load(request_id).await?;
        if before.status.is_terminal() {
            return Ok(TransitionOutcome::Denied(Denial::TerminalState {
                status: before.status,
            }));
        }

        let definition = self.registry.get(before.workflow);
        let action = match completion_action(definition, before.role_current) {
            Some(action) => action,
            None => {
                let fallback = definition
                    .completion_actions
                    .first()
                    .copied()
                    .unwrap_or(Action::SubmitFeedback);
                return Ok(TransitionOutcome::Denied(Denial::InvalidAction {
                    action: fallback,
                    role: before.role_current,
                }));
            }
        };

        let now = OffsetDateTime::now_utc();
        let mut after = before.clone();
        after.status = RequestStatus::Completed;
        after.completion_rating = completion.rating;
        after.feedback_comments = completion.comments.clone();
        after.updated_at = now;

        let mut transition_data = TransitionData::new();
        transition_data.rating = completion.rating;
        transition_data.comments = completion.comments.clone();
        transition_data.apply_to(&mut after.state_data);

        let transition = TransitionRecord {
            id: generate_transition_id(),
            request_id: request_id.to_string(),
            seq: 0,
            from_role: Some(before.role_current),
            to_role: before.role_current,
            action,
            actor_id: completion.actor_id.clone(),
            transition_data,
            comments: completion.comments.clone(),
            created_at: now,
        };

        let mut txn = StateTransaction::new();
        txn.update(before.clone(), after.clone()).append(transition);
        let receipt = txn
            .commit(&self.store)
            .await
            .map_err(|f| self.raise("complete_workflow", EngineError::Transaction(f)))?;

        tracing::info!(request_id, rating = ?completion.rating, "workflow completed");

        if !after.equipment_used.is_empty() && !after.inventory_updated {
            self.consume_equipment(&after, receipt.new_version, now).await;
        }

        Ok(TransitionOutcome::Applied {
            request_id: request_id.to_string(),
            next_role: None,
            notification: NotificationDisposition::NotRequired,
        })
    }

    /// Read a request.
    pub async fn get_request(
        &self,
        request_id: &str,
    ) -> Result<Option<RequestRecord>, EngineError> {
        Ok(self.store.get_request(request_id).await?)
    }

    /// Full ordered transition history.
    pub async fn get_request_history(
        &self,
        request_id: &str,
    ) -> Result<Vec<TransitionRecord>, EngineError> {
        Ok(self.store.get_history(request_id).await?)
    }

    /// Run the inventory reconciliation sweep.
    pub async fn reconcile_inventory(
        &self,
        now: OffsetDateTime,
    ) -> Result<ReconciliationReport, EngineError> {
        reconcile_inventory(
            &self.store,
            self.inventory.as_ref(),
            &self.config.reconcile,
            now,
        )
        .await
    }

    // ── Retry processing ─────────────────────────────────────────────────

    /// Attempt every queued notification due at `now`. Failures reschedule
    /// with backoff until the policy's `max_retries`, then drop.
    pub async fn process_retries(&self, now: OffsetDateTime) -> RetryReport {
        let due = {
            let mut queue = self.retry_queue.lock().expect("retry queue poisoned");
            queue.take_due(now)
        };

        let mut report = RetryReport::default();
        for mut entry in due {
            report.attempted += 1;
            let attempt = entry.retry_count + 1;
            let failure = match self.notifier.send_assignment(&entry.notification).await {
                Ok(true) => None,
                Ok(false) => Some("delivery refused".to_string()),
                Err(e) => Some(e.to_string()),
            };
            match failure {
                None => {
                    report.delivered += 1;
                    tracing::info!(
                        request_id = %entry.notification.request_id,
                        role = %entry.notification.role,
                        attempt,
                        "queued notification delivered"
                    );
                }
                Some(message) => {
                    entry.retry_count = attempt;
                    entry.last_error = Some(message.clone());
                    if entry.retry_count >= self.config.retry.max_retries {
                        report.exhausted += 1;
                        tracing::warn!(
                            request_id = %entry.notification.request_id,
                            role = %entry.notification.role,
                            retries = entry.retry_count,
                            error = %message,
                            "notification retries exhausted; giving up"
                        );
                    } else {
                        entry.next_retry_at =
                            self.config.retry.next_retry_at(now, entry.retry_count + 1);
                        let mut queue =
                            self.retry_queue.lock().expect("retry queue poisoned");
                        if queue.enqueue(entry) {
                            report.rescheduled += 1;
                        } else {
                            report.exhausted += 1;
                            let error = EngineError::RetryQueueFull {
                                capacity: queue.capacity(),
                            };
                            drop(queue);
                            let _ = self.raise("process_retries", error);
                        }
                    }
                }
            }
        }
        report
    }

    /// Number of notifications currently waiting for retry.
    pub fn pending_retries(&self) -> usize {
        self.retry_queue.lock().expect("retry queue poisoned").len()
    }

    // ── Internals (shared with recovery) ─────────────────────────────────

    pub(crate) async fn load(&self, request_id: &str) -> Result<RequestRecord, EngineError> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| EngineError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    pub(crate) fn request_lock(&self, request_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.request_locks.lock().expect("lock map poisoned");
        locks
            .entry(request_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Classify, log, alert on critical, and hand the error back.
    pub(crate) fn raise(&self, context: &str, error: EngineError) -> EngineError {
        let (category, severity) = classify(&error);
        tracing::error!(context, ?category, ?severity, error = %error, "engine operation failed");
        if severity == Severity::Critical {
            self.alerts.critical_alert(context, &error);
        }
        error
    }

    async fn dispatch_assignment(
        &self,
        role: Role,
        request_id: &str,
        workflow: WorkflowKind,
        now: OffsetDateTime,
    ) -> NotificationDisposition {
        if !role_receives_assignments(role) {
            return NotificationDisposition::Excluded;
        }
        let notification = AssignmentNotification {
            role,
            request_id: request_id.to_string(),
            workflow,
        };
        match self.notifier.send_assignment(&notification).await {
            Ok(true) => NotificationDisposition::Delivered,
            Ok(false) => self.queue_retry(notification, "delivery refused".to_string(), now),
            Err(e) => {
                tracing::warn!(request_id, role = %role, error = %e, "notification send failed");
                self.queue_retry(notification, e.to_string(), now)
            }
        }
    }

    fn queue_retry(
        &self,
        notification: AssignmentNotification,
        error: String,
        now: OffsetDateTime,
    ) -> NotificationDisposition {
        let entry = PendingNotification {
            next_retry_at: self.config.retry.next_retry_at(now, 1),
            notification,
            retry_count: 0,
            last_error: Some(error),
        };
        let mut queue = self.retry_queue.lock().expect("retry queue poisoned");
        if queue.enqueue(entry) {
            NotificationDisposition::Queued
        } else {
            let capacity = queue.capacity();
            drop(queue);
            let _ = self.raise(
                "dispatch_assignment",
                EngineError::RetryQueueFull { capacity },
            );
            NotificationDisposition::Dropped
        }
    }

    async fn reserve_equipment(&self, request_id: &str, lines: &[dispatch_core::EquipmentLine]) {
        match self.inventory.reserve_equipment(request_id, lines).await {
            Ok(true) => {
                tracing::info!(request_id, lines = lines.len(), "equipment reserved");
            }
            Ok(false) => {
                tracing::warn!(request_id, "equipment reservation refused; reconciliation will review");
            }
            Err(e) => {
                let _ = self.raise("reserve_equipment", EngineError::Inventory(e));
            }
        }
    }

    /// Consume reserved stock after completion and flip the request's
    /// `inventory_updated` flag. The flip is best-effort: if it fails, the
    /// reconciliation sweep repairs the orphaned consumption later.
    async fn consume_equipment(
        &self,
        record: &RequestRecord,
        version: Option<i64>,
        now: OffsetDateTime,
    ) {
        match self
            .inventory
            .consume_reserved(&record.id, &record.equipment_used, now)
            .await
        {
            Ok(true) => {
                let mut flagged = record.clone();
                flagged.inventory_updated = true;
                let expected = version.unwrap_or(record.version);
                if let Err(e) = self.store.update_request(flagged, expected).await {
                    tracing::warn!(
                        request_id = %record.id,
                        error = %e,
                        "inventory consumed but flag update failed; reconciliation will repair"
                    );
                }
            }
            Ok(false) => {
                tracing::warn!(request_id = %record.id, "inventory consumption refused");
            }
            Err(e) => {
                let _ = self.raise("consume_equipment", EngineError::Inventory(e));
            }
        }
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn completion_action(definition: &WorkflowDefinition, role: Role) -> Option<Action> {
    let step = definition.step(role)?;
    definition
        .completion_actions
        .iter()
        .copied()
        .find(|action| step.allows(*action))
}

fn generate_request_id() -> String {
    format!("REQ-{:012X}", random_id_bits())
}

fn generate_transition_id() -> String {
    format!("TRN-{:012X}", random_id_bits())
}

fn random_id_bits() -> u64 {
    rand::thread_rng().gen::<u64>() & 0xFFFF_FFFF_FFFF
}
