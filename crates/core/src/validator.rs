//! Transition validation.
//!
//! Given the request's current status/owner and a requested action, decide
//! legality and resolve the next owning role. Check order:
//!
//! 1. terminal status — terminal states are sinks
//! 2. actor matches the current owner — the single-owner invariant
//! 3. action is listed for the owner's step (cancel is always available)
//! 4. required data present before a role-changing action leaves the step

use crate::action::Action;
use crate::data::{StateData, TransitionData};
use crate::definition::WorkflowDefinition;
use crate::error::Denial;
use crate::role::Role;
use crate::status::RequestStatus;

/// Validate a requested transition and resolve the next owner.
///
/// Returns `Ok(Some(role))` for a role-changing action, `Ok(None)` for a
/// self-loop sub-step (and for `CancelRequest`, which terminates instead of
/// handing off), and a [`Denial`] for every expected rejection.
pub fn validate_transition(
    definition: &WorkflowDefinition,
    status: RequestStatus,
    role_current: Role,
    action: Action,
    actor_role: Role,
    state_data: &StateData,
    transition_data: &TransitionData,
) -> Result<Option<Role>, Denial> {
    if status.is_terminal() {
        return Err(Denial::TerminalState { status });
    }

    if actor_role != role_current {
        return Err(Denial::InvalidActor {
            actor: actor_role,
            owner: role_current,
        });
    }

    // Cancellation is a terminal business action available to the current
    // owner from any non-terminal state, whether or not the step lists it.
    if action == Action::CancelRequest {
        return Ok(None);
    }

    let step = definition
        .step(role_current)
        .ok_or(Denial::RoleNotInWorkflow { role: role_current })?;

    if !step.allows(action) {
        return Err(Denial::InvalidAction {
            action,
            role: role_current,
        });
    }

    let next_role = step.next_role(action);

    // Required data gates departure from the step; self-loops may
    // accumulate partial data freely.
    if next_role.is_some() {
        for field in &step.required_data {
            if !state_data.contains_key(field) && !transition_data.contains_field(field) {
                return Err(Denial::MissingData {
                    field: field.clone(),
                });
            }
        }
    }

    Ok(next_role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkflowRegistry;
    use crate::status::WorkflowKind;

    fn tech_service() -> WorkflowDefinition {
        WorkflowRegistry::builtin()
            .get(WorkflowKind::TechnicalService)
            .clone()
    }

    fn data_with_technician() -> TransitionData {
        let mut data = TransitionData::new();
        data.technician_id = Some("42".to_string());
        data
    }

    #[test]
    fn terminal_state_rejected_before_anything_else() {
        let def = tech_service();
        // Even a fully legal action from the owning role is rejected.
        let result = validate_transition(
            &def,
            RequestStatus::Completed,
            Role::Controller,
            Action::AssignToTechnician,
            Role::Controller,
            &StateData::new(),
            &data_with_technician(),
        );
        match result {
            Err(Denial::TerminalState { status }) => {
                assert_eq!(status, RequestStatus::Completed)
            }
            other => panic!("expected TerminalState, got {:?}", other),
        }
    }

    #[test]
    fn wrong_actor_rejected_regardless_of_action_legality() {
        let def = tech_service();
        // The action is legal for controller, but the actor is a manager.
        let result = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Controller,
            Action::AssignToTechnician,
            Role::Manager,
            &StateData::new(),
            &data_with_technician(),
        );
        match result {
            Err(Denial::InvalidActor { actor, owner }) => {
                assert_eq!(actor, Role::Manager);
                assert_eq!(owner, Role::Controller);
            }
            other => panic!("expected InvalidActor, got {:?}", other),
        }
    }

    #[test]
    fn action_not_in_step_rejected() {
        let def = tech_service();
        let result = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Controller,
            Action::IssueEquipment,
            Role::Controller,
            &StateData::new(),
            &TransitionData::new(),
        );
        match result {
            Err(Denial::InvalidAction { action, role }) => {
                assert_eq!(action, Action::IssueEquipment);
                assert_eq!(role, Role::Controller);
            }
            other => panic!("expected InvalidAction, got {:?}", other),
        }
    }

    #[test]
    fn legal_handoff_resolves_next_role() {
        let def = tech_service();
        let next = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Controller,
            Action::AssignToTechnician,
            Role::Controller,
            &StateData::new(),
            &data_with_technician(),
        )
        .unwrap();
        assert_eq!(next, Some(Role::Technician));
    }

    #[test]
    fn self_loop_resolves_none() {
        let def = tech_service();
        let next = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Technician,
            Action::StartDiagnostics,
            Role::Technician,
            &StateData::new(),
            &TransitionData::new(),
        )
        .unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn missing_required_data_blocks_departure() {
        let def = tech_service();
        let result = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Controller,
            Action::AssignToTechnician,
            Role::Controller,
            &StateData::new(),
            &TransitionData::new(),
        );
        match result {
            Err(Denial::MissingData { field }) => assert_eq!(field, "technician_id"),
            other => panic!("expected MissingData, got {:?}", other),
        }
    }

    #[test]
    fn required_data_satisfied_by_accumulated_state() {
        let def = tech_service();
        let mut state = StateData::new();
        state.insert("technician_id", serde_json::json!("42"));
        let next = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Controller,
            Action::AssignToTechnician,
            Role::Controller,
            &state,
            &TransitionData::new(),
        )
        .unwrap();
        assert_eq!(next, Some(Role::Technician));
    }

    #[test]
    fn required_data_does_not_gate_self_loops() {
        let def = tech_service();
        // Controller's step requires technician_id, but clarifying the
        // issue stays with the controller and needs nothing.
        let next = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Controller,
            Action::ClarifyIssue,
            Role::Controller,
            &StateData::new(),
            &TransitionData::new(),
        )
        .unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn cancel_is_always_available_to_the_owner() {
        let def = tech_service();
        // Warehouse's step does not list cancel_request.
        let next = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Warehouse,
            Action::CancelRequest,
            Role::Warehouse,
            &StateData::new(),
            &TransitionData::new(),
        )
        .unwrap();
        assert_eq!(next, None);
    }

    #[test]
    fn cancel_still_requires_the_owner() {
        let def = tech_service();
        let result = validate_transition(
            &def,
            RequestStatus::InProgress,
            Role::Technician,
            Action::CancelRequest,
            Role::Client,
            &StateData::new(),
            &TransitionData::new(),
        );
        match result {
            Err(Denial::InvalidActor { .. }) => {}
            other => panic!("expected InvalidActor, got {:?}", other),
        }
    }

    #[test]
    fn cancel_rejected_in_terminal_state() {
        let def = tech_service();
        let result = validate_transition(
            &def,
            RequestStatus::Cancelled,
            Role::Technician,
            Action::CancelRequest,
            Role::Technician,
            &StateData::new(),
            &TransitionData::new(),
        );
        match result {
            Err(Denial::TerminalState { .. }) => {}
            other => panic!("expected TerminalState, got {:?}", other),
        }
    }
}
