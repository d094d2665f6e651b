//! The closed set of actions that drive workflow transitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A named action a role can perform on a request.
///
/// Which actions are legal for a given role, and which role (if any) becomes
/// the next owner, is decided by the workflow definition — never here. The
/// `Create`, `ForceTransition`, `ForceComplete`, `ResetState` and
/// `ReassignRole` variants are reserved for the engine and admin recovery;
/// they appear in transition history but never in a step's action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    // Synthetic record appended when a request is initiated.
    Create,

    // Manager chain.
    ReviewRequest,
    AddCallNotes,
    ForwardToJuniorManager,
    CreateConnectionOrder,
    RequestClarification,
    ReturnToManager,

    // Controller / technician chain.
    AssignToTechnician,
    ClarifyIssue,
    StartInstallation,
    StartDiagnostics,
    RecordDiagnostics,
    RequestEquipment,
    IssueEquipment,
    CompleteInstallation,
    ResolveIssue,

    // Call-center chain.
    EscalateToSupervisor,
    ReturnToOperator,
    ResolveDirectly,

    // Client feedback / terminal actions.
    SubmitFeedback,
    CancelRequest,

    // Admin recovery overrides.
    ForceTransition,
    ForceComplete,
    ResetState,
    ReassignRole,
}

impl Action {
    /// The wire/storage name of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::ReviewRequest => "review_request",
            Action::AddCallNotes => "add_call_notes",
            Action::ForwardToJuniorManager => "forward_to_junior_manager",
            Action::CreateConnectionOrder => "create_connection_order",
            Action::RequestClarification => "request_clarification",
            Action::ReturnToManager => "return_to_manager",
            Action::AssignToTechnician => "assign_to_technician",
            Action::ClarifyIssue => "clarify_issue",
            Action::StartInstallation => "start_installation",
            Action::StartDiagnostics => "start_diagnostics",
            Action::RecordDiagnostics => "record_diagnostics",
            Action::RequestEquipment => "request_equipment",
            Action::IssueEquipment => "issue_equipment",
            Action::CompleteInstallation => "complete_installation",
            Action::ResolveIssue => "resolve_issue",
            Action::EscalateToSupervisor => "escalate_to_supervisor",
            Action::ReturnToOperator => "return_to_operator",
            Action::ResolveDirectly => "resolve_directly",
            Action::SubmitFeedback => "submit_feedback",
            Action::CancelRequest => "cancel_request",
            Action::ForceTransition => "force_transition",
            Action::ForceComplete => "force_complete",
            Action::ResetState => "reset_state",
            Action::ReassignRole => "reassign_role",
        }
    }

    /// Whether this action is an engine/admin override rather than a step
    /// action a workflow definition may list.
    pub fn is_override(&self) -> bool {
        matches!(
            self,
            Action::Create
                | Action::ForceTransition
                | Action::ForceComplete
                | Action::ResetState
                | Action::ReassignRole
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Action::Create),
            "review_request" => Ok(Action::ReviewRequest),
            "add_call_notes" => Ok(Action::AddCallNotes),
            "forward_to_junior_manager" => Ok(Action::ForwardToJuniorManager),
            "create_connection_order" => Ok(Action::CreateConnectionOrder),
            "request_clarification" => Ok(Action::RequestClarification),
            "return_to_manager" => Ok(Action::ReturnToManager),
            "assign_to_technician" => Ok(Action::AssignToTechnician),
            "clarify_issue" => Ok(Action::ClarifyIssue),
            "start_installation" => Ok(Action::StartInstallation),
            "start_diagnostics" => Ok(Action::StartDiagnostics),
            "record_diagnostics" => Ok(Action::RecordDiagnostics),
            "request_equipment" => Ok(Action::RequestEquipment),
            "issue_equipment" => Ok(Action::IssueEquipment),
            "complete_installation" => Ok(Action::CompleteInstallation),
            "resolve_issue" => Ok(Action::ResolveIssue),
            "escalate_to_supervisor" => Ok(Action::EscalateToSupervisor),
            "return_to_operator" => Ok(Action::ReturnToOperator),
            "resolve_directly" => Ok(Action::ResolveDirectly),
            "submit_feedback" => Ok(Action::SubmitFeedback),
            "cancel_request" => Ok(Action::CancelRequest),
            "force_transition" => Ok(Action::ForceTransition),
            "force_complete" => Ok(Action::ForceComplete),
            "reset_state" => Ok(Action::ResetState),
            "reassign_role" => Ok(Action::ReassignRole),
            other => Err(ParseError::UnknownAction(other.to_string())),
        }
    }
}
