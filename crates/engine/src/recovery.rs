//! Stuck-workflow detection and admin recovery.
//!
//! A request is "stuck" when it is non-terminal and its `updated_at` is
//! older than the configured threshold. Recovery actions are explicit
//! escape hatches: they bypass the transition validator, but every one of
//! them still appends an override-flagged transition with the admin as the
//! actor, so the history stays complete even for exceptional paths.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use dispatch_core::{Action, RequestStatus, Role, TransitionData, WorkflowKind};
use dispatch_storage::{RequestFilter, RequestRecord, RequestStore, TransitionRecord};

use crate::engine::{NotificationDisposition, TransitionOutcome, WorkflowEngine};
use crate::error::EngineError;
use crate::txn::StateTransaction;

// ──────────────────────────────────────────────
// Types
// ──────────────────────────────────────────────

/// A non-terminal request that has not moved within the threshold.
#[derive(Debug, Clone, Serialize)]
pub struct StuckWorkflow {
    pub request_id: String,
    pub workflow: WorkflowKind,
    pub role_current: Role,
    pub status: RequestStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Hours since the last update.
    pub stale_hours: i64,
}

/// Admin recovery actions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Override `role_current` directly, bypassing the validator.
    ForceTransition { to_role: Role },
    /// Replay the second-to-last transition's `from_role`.
    ResetToPrevious,
    /// Force the terminal `Completed` status with an admin-supplied rating.
    ForceComplete { rating: Option<u8> },
    /// Hand the work to a different person within the same role. Logged
    /// only; no state change.
    ReassignRole { new_actor_id: String },
}

/// A recovery action applicable to a request, for operator menus.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOption {
    pub action: String,
    pub description: String,
}

// ──────────────────────────────────────────────
// Engine operations
// ──────────────────────────────────────────────

impl<S: RequestStore> WorkflowEngine<S> {
    /// Find non-terminal requests whose last update is older than
    /// `hours_threshold` at `now`.
    pub async fn detect_stuck_workflows(
        &self,
        hours_threshold: u64,
        now: OffsetDateTime,
    ) -> Result<Vec<StuckWorkflow>, EngineError> {
        let cutoff = now - Duration::hours(hours_threshold as i64);
        let filter = RequestFilter {
            non_terminal_only: true,
            updated_before: Some(cutoff),
            ..RequestFilter::default()
        };
        let records = self.store().list_requests(&filter).await?;
        Ok(records
            .into_iter()
            .map(|record| StuckWorkflow {
                stale_hours: (now - record.updated_at).whole_hours(),
                request_id: record.id,
                workflow: record.workflow,
                role_current: record.role_current,
                status: record.status,
                updated_at: record.updated_at,
            })
            .collect())
    }

    /// Recovery actions applicable to a request in its current state.
    pub async fn get_recovery_options(
        &self,
        request_id: &str,
    ) -> Result<Vec<RecoveryOption>, EngineError> {
        let record = self.load(request_id).await?;
        if record.status.is_terminal() {
            return Ok(Vec::new());
        }

        let definition = self.get_workflow_definition(record.workflow);
        let mut options = vec![RecoveryOption {
            action: "force_transition".to_string(),
            description: format!(
                "override the owning role (currently {}; steps: {})",
                record.role_current,
                definition
                    .roles()
                    .iter()
                    .map(|r| r.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }];

        if previous_role(&self.store().get_history(request_id).await?).is_some() {
            options.push(RecoveryOption {
                action: "reset_to_previous".to_string(),
                description: "return the request to the previous owning role".to_string(),
            });
        }

        options.push(RecoveryOption {
            action: "force_complete".to_string(),
            description: "force the terminal completed status".to_string(),
        });
        options.push(RecoveryOption {
            action: "reassign_role".to_string(),
            description: format!(
                "assign a different {} to the request (no state change)",
                record.role_current
            ),
        });
        Ok(options)
    }

    /// Apply an admin recovery action.
    ///
    /// Bypasses the validator. Appends an override transition with
    /// `actor_id` = the admin and a comment flagging the override.
    pub async fn recover_workflow(
        &self,
        request_id: &str,
        action: RecoveryAction,
        admin_id: &str,
        mut data: TransitionData,
    ) -> Result<TransitionOutcome, EngineError> {
        let lock = self.request_lock(request_id);
        let _guard = lock.lock().await;

        let before = self.load(request_id).await?;
        if before.status.is_terminal() {
            return Err(EngineError::RecoveryNotApplicable {
                request_id: request_id.to_string(),
                reason: format!("request is already {}", before.status),
            });
        }

        let now = OffsetDateTime::now_utc();
        let (after, record_action, to_role, note) = match action {
            RecoveryAction::ForceTransition { to_role } => {
                let definition = self.get_workflow_definition(before.workflow);
                if !definition.contains_role(to_role) {
                    return Err(EngineError::RecoveryNotApplicable {
                        request_id: request_id.to_string(),
                        reason: format!(
                            "role '{}' is not a step of workflow '{}'",
                            to_role, before.workflow
                        ),
                    });
                }
                let mut after = before.clone();
                after.role_current = to_role;
                after.updated_at = now;
                (
                    after,
                    Action::ForceTransition,
                    to_role,
                    format!("admin override: forced transition to {}", to_role),
                )
            }
            RecoveryAction::ResetToPrevious => {
                let history = self.store().get_history(request_id).await?;
                let role = previous_role(&history).ok_or_else(|| {
                    EngineError::RecoveryNotApplicable {
                        request_id: request_id.to_string(),
                        reason: "no previous state to reset to".to_string(),
                    }
                })?;
                let mut after = before.clone();
                after.role_current = role;
                after.updated_at = now;
                (
                    after,
                    Action::ResetState,
                    role,
                    format!("admin override: reset to previous role {}", role),
                )
            }
            RecoveryAction::ForceComplete { rating } => {
                let mut after = before.clone();
                after.status = RequestStatus::Completed;
                after.completion_rating = rating;
                after.updated_at = now;
                (
                    after,
                    Action::ForceComplete,
                    before.role_current,
                    "admin override: forced completion".to_string(),
                )
            }
            RecoveryAction::ReassignRole { ref new_actor_id } => {
                data.extra.insert(
                    "reassigned_to".to_string(),
                    serde_json::Value::String(new_actor_id.clone()),
                );
                let mut after = before.clone();
                after.updated_at = now;
                (
                    after,
                    Action::ReassignRole,
                    before.role_current,
                    format!(
                        "admin override: reassigned within {} to {}",
                        before.role_current, new_actor_id
                    ),
                )
            }
        };

        let next_role = (after.role_current != before.role_current).then_some(after.role_current);
        let transition = TransitionRecord {
            id: recovery_transition_id(request_id, &before),
            request_id: request_id.to_string(),
            seq: 0,
            from_role: Some(before.role_current),
            to_role,
            action: record_action,
            actor_id: admin_id.to_string(),
            transition_data: data,
            comments: Some(note.clone()),
            created_at: now,
        };

        let mut txn = StateTransaction::new();
        txn.update(before, after).append(transition);
        txn.commit(self.store())
            .await
            .map_err(|f| self.raise("recover_workflow", EngineError::Transaction(f)))?;

        tracing::warn!(request_id, admin_id, action = %record_action, note, "admin recovery applied");

        Ok(TransitionOutcome::Applied {
            request_id: request_id.to_string(),
            next_role,
            notification: NotificationDisposition::NotRequired,
        })
    }
}

/// The role the request held before its last transition: the
/// second-to-last record's `to_role`.
fn previous_role(history: &[TransitionRecord]) -> Option<Role> {
    if history.len() < 2 {
        return None;
    }
    Some(history[history.len() - 2].to_role)
}

fn recovery_transition_id(request_id: &str, record: &RequestRecord) -> String {
    format!("TRN-{}-R{}", request_id.trim_start_matches("REQ-"), record.version)
}
