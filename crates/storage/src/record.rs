//! Persisted record types for requests and their transition history.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use dispatch_core::{
    Action, CreationSource, EquipmentLine, Priority, RequestStatus, Role, StateData,
    TransitionData, WorkflowKind,
};

/// A service request as stored in the backend.
///
/// This is a cached projection of "latest transition": every change to
/// `role_current` or `status` is paired with exactly one appended
/// [`TransitionRecord`], and the history is the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: String,
    pub workflow: WorkflowKind,
    pub client_id: String,
    /// The single role currently responsible for acting on this request.
    pub role_current: Role,
    pub status: RequestStatus,
    pub priority: Priority,
    pub state_data: StateData,
    pub equipment_used: Vec<EquipmentLine>,
    pub inventory_updated: bool,
    pub created_by_staff: bool,
    pub staff_creator_id: Option<String>,
    pub staff_creator_role: Option<Role>,
    pub creation_source: CreationSource,
    pub completion_rating: Option<u8>,
    pub feedback_comments: Option<String>,
    /// OCC version; starts at 1 and increments on every committed update.
    pub version: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One immutable entry of a request's transition history.
///
/// Created once, never mutated. `seq` is assigned by the store and is
/// strictly increasing per request — it is the ordering guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: String,
    pub request_id: String,
    /// Store-assigned, strictly increasing per request. Pass 0 on insert.
    pub seq: u64,
    /// `None` only for the synthetic record appended at initiation.
    pub from_role: Option<Role>,
    pub to_role: Role,
    pub action: Action,
    pub actor_id: String,
    /// Snapshot of the input supplied for this step.
    pub transition_data: TransitionData,
    pub comments: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl TransitionRecord {
    /// Whether this record changed the owning role.
    pub fn changed_role(&self) -> bool {
        self.from_role != Some(self.to_role)
    }
}

/// Filter for listing requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub workflow: Option<WorkflowKind>,
    pub status: Option<RequestStatus>,
    /// Only requests whose status is non-terminal.
    pub non_terminal_only: bool,
    /// Only requests last updated strictly before this instant.
    pub updated_before: Option<OffsetDateTime>,
    /// Maximum number of results; 0 means no limit.
    pub limit: usize,
}

impl RequestFilter {
    pub fn matches(&self, record: &RequestRecord) -> bool {
        if let Some(workflow) = self.workflow {
            if record.workflow != workflow {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if self.non_terminal_only && record.status.is_terminal() {
            return false;
        }
        if let Some(cutoff) = self.updated_before {
            if record.updated_at >= cutoff {
                return false;
            }
        }
        true
    }
}
