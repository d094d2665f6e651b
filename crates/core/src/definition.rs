//! Static workflow definitions: role sequences, per-role actions, and
//! per-action next roles.
//!
//! The registry is the single source of truth for "what next". It is built
//! once at process start and passed by reference into the engine and the
//! validator; nothing mutates it at runtime. Handler code must never
//! duplicate the `next_steps` mapping.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::action::Action;
use crate::role::Role;
use crate::status::WorkflowKind;

// ──────────────────────────────────────────────
// Definition types
// ──────────────────────────────────────────────

/// One step of a workflow: the actions a role may perform while it owns the
/// request, and where each action hands ownership next.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStep {
    pub role: Role,
    /// Actions available to this role at this step.
    pub actions: Vec<Action>,
    /// Action → next owner role. `None` marks a sub-step that keeps the
    /// request with the same role (still recorded in history, never
    /// notified).
    pub next_steps: BTreeMap<Action, Option<Role>>,
    /// Fields that must be present (in state data or the transition's data)
    /// before a role-changing action may leave this step.
    pub required_data: Vec<String>,
    /// Fields this step is expected to contribute but may omit.
    pub optional_data: Vec<String>,
}

impl WorkflowStep {
    /// Resolve the next owner for an action at this step. Missing entries
    /// are treated as self-loops.
    pub fn next_role(&self, action: Action) -> Option<Role> {
        self.next_steps.get(&action).copied().flatten()
    }

    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

/// A complete workflow definition for one request kind.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDefinition {
    pub kind: WorkflowKind,
    pub initial_role: Role,
    pub steps: BTreeMap<Role, WorkflowStep>,
    /// Actions that may close the request through the happy path.
    pub completion_actions: Vec<Action>,
}

impl WorkflowDefinition {
    pub fn step(&self, role: Role) -> Option<&WorkflowStep> {
        self.steps.get(&role)
    }

    pub fn contains_role(&self, role: Role) -> bool {
        self.steps.contains_key(&role)
    }

    /// Roles of this workflow in step order.
    pub fn roles(&self) -> Vec<Role> {
        self.steps.keys().copied().collect()
    }
}

// ──────────────────────────────────────────────
// Registry
// ──────────────────────────────────────────────

/// The immutable catalog of the three built-in workflows.
#[derive(Debug, Clone)]
pub struct WorkflowRegistry {
    connection_request: WorkflowDefinition,
    technical_service: WorkflowDefinition,
    call_center_direct: WorkflowDefinition,
}

impl WorkflowRegistry {
    /// Build the catalog. Called once at startup.
    pub fn builtin() -> Self {
        WorkflowRegistry {
            connection_request: connection_request(),
            technical_service: technical_service(),
            call_center_direct: call_center_direct(),
        }
    }

    /// Look up the definition for a workflow kind. Total on the closed enum.
    pub fn get(&self, kind: WorkflowKind) -> &WorkflowDefinition {
        match kind {
            WorkflowKind::ConnectionRequest => &self.connection_request,
            WorkflowKind::TechnicalService => &self.technical_service,
            WorkflowKind::CallCenterDirect => &self.call_center_direct,
        }
    }

    pub fn all(&self) -> [&WorkflowDefinition; 3] {
        [
            &self.connection_request,
            &self.technical_service,
            &self.call_center_direct,
        ]
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        WorkflowRegistry::builtin()
    }
}

// ──────────────────────────────────────────────
// Built-in definitions
// ──────────────────────────────────────────────

fn step(
    role: Role,
    actions: &[(Action, Option<Role>)],
    required_data: &[&str],
    optional_data: &[&str],
) -> WorkflowStep {
    WorkflowStep {
        role,
        actions: actions.iter().map(|(a, _)| *a).collect(),
        next_steps: actions.iter().map(|(a, next)| (*a, *next)).collect(),
        required_data: required_data.iter().map(|s| s.to_string()).collect(),
        optional_data: optional_data.iter().map(|s| s.to_string()).collect(),
    }
}

fn definition(
    kind: WorkflowKind,
    initial_role: Role,
    steps: Vec<WorkflowStep>,
    completion_actions: &[Action],
) -> WorkflowDefinition {
    WorkflowDefinition {
        kind,
        initial_role,
        steps: steps.into_iter().map(|s| (s.role, s)).collect(),
        completion_actions: completion_actions.to_vec(),
    }
}

/// New-client connection: manager review → junior manager paperwork →
/// controller assignment → technician installation (pulling equipment from
/// the warehouse) → client feedback.
fn connection_request() -> WorkflowDefinition {
    definition(
        WorkflowKind::ConnectionRequest,
        Role::Manager,
        vec![
            step(
                Role::Manager,
                &[
                    (Action::ReviewRequest, None),
                    (Action::AddCallNotes, None),
                    (Action::ForwardToJuniorManager, Some(Role::JuniorManager)),
                ],
                &[],
                &["comments"],
            ),
            step(
                Role::JuniorManager,
                &[
                    (Action::RequestClarification, None),
                    (Action::CreateConnectionOrder, Some(Role::Controller)),
                ],
                &[],
                &["comments", "tariff"],
            ),
            step(
                Role::Controller,
                &[
                    (Action::ReturnToManager, Some(Role::Manager)),
                    (Action::AssignToTechnician, Some(Role::Technician)),
                ],
                &["technician_id"],
                &["comments"],
            ),
            step(
                Role::Technician,
                &[
                    (Action::StartInstallation, None),
                    (Action::RequestEquipment, Some(Role::Warehouse)),
                    (Action::CompleteInstallation, Some(Role::Client)),
                ],
                &[],
                &["diagnostics", "equipment"],
            ),
            step(
                Role::Warehouse,
                &[(Action::IssueEquipment, Some(Role::Technician))],
                &[],
                &["equipment", "comments"],
            ),
            step(Role::Client, &[(Action::SubmitFeedback, None)], &[], &["rating", "comments"]),
        ],
        &[Action::SubmitFeedback],
    )
}

/// Technical service call: controller triage → technician diagnostics and
/// repair (optionally via the warehouse) → client feedback.
fn technical_service() -> WorkflowDefinition {
    definition(
        WorkflowKind::TechnicalService,
        Role::Controller,
        vec![
            step(
                Role::Controller,
                &[
                    (Action::ClarifyIssue, None),
                    (Action::AssignToTechnician, Some(Role::Technician)),
                ],
                &["technician_id"],
                &["comments"],
            ),
            step(
                Role::Technician,
                &[
                    (Action::StartDiagnostics, None),
                    (Action::RecordDiagnostics, None),
                    (Action::RequestEquipment, Some(Role::Warehouse)),
                    (Action::ResolveIssue, Some(Role::Client)),
                ],
                &[],
                &["diagnostics", "equipment"],
            ),
            step(
                Role::Warehouse,
                &[(Action::IssueEquipment, Some(Role::Technician))],
                &[],
                &["equipment", "comments"],
            ),
            step(Role::Client, &[(Action::SubmitFeedback, None)], &[], &["rating", "comments"]),
        ],
        &[Action::SubmitFeedback],
    )
}

/// Call-center direct request: operator handles the call, optionally
/// escalating to the supervisor, then hands back to the client for feedback.
fn call_center_direct() -> WorkflowDefinition {
    definition(
        WorkflowKind::CallCenterDirect,
        Role::CallCenter,
        vec![
            step(
                Role::CallCenter,
                &[
                    (Action::AddCallNotes, None),
                    (Action::EscalateToSupervisor, Some(Role::CallCenterSupervisor)),
                    (Action::ResolveDirectly, Some(Role::Client)),
                ],
                &[],
                &["comments"],
            ),
            step(
                Role::CallCenterSupervisor,
                &[
                    (Action::ReturnToOperator, Some(Role::CallCenter)),
                    (Action::ResolveIssue, Some(Role::Client)),
                ],
                &[],
                &["comments"],
            ),
            step(Role::Client, &[(Action::SubmitFeedback, None)], &[], &["rating", "comments"]),
        ],
        &[Action::SubmitFeedback],
    )
}
