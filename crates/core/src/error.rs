//! Domain errors: expected business denials and parse failures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::role::Role;
use crate::status::RequestStatus;

/// An expected business-rule denial of a requested transition.
///
/// Denials are ordinary outcomes, not failures: callers branch on them and
/// show the user "not allowed", so they are returned as a value, never
/// raised through the error channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Denial {
    /// The request has already reached a terminal status.
    TerminalState { status: RequestStatus },
    /// The actor is not the role currently responsible for the request.
    InvalidActor { actor: Role, owner: Role },
    /// The action is not available to the current role's step.
    InvalidAction { action: Action, role: Role },
    /// A field the step requires before leaving is missing.
    MissingData { field: String },
    /// The request's current role has no step in its workflow definition.
    RoleNotInWorkflow { role: Role },
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::TerminalState { status } => {
                write!(f, "request is already {}", status)
            }
            Denial::InvalidActor { actor, owner } => {
                write!(
                    f,
                    "role '{}' may not act: request is owned by '{}'",
                    actor, owner
                )
            }
            Denial::InvalidAction { action, role } => {
                write!(f, "action '{}' is not available to role '{}'", action, role)
            }
            Denial::MissingData { field } => {
                write!(f, "required field '{}' is missing", field)
            }
            Denial::RoleNotInWorkflow { role } => {
                write!(f, "role '{}' is not a step of this workflow", role)
            }
        }
    }
}

impl std::error::Error for Denial {}

/// Failure to parse a wire string into one of the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownRole(String),
    UnknownAction(String),
    UnknownWorkflow(String),
    UnknownStatus(String),
    UnknownPriority(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownRole(s) => write!(f, "unknown role: {}", s),
            ParseError::UnknownAction(s) => write!(f, "unknown action: {}", s),
            ParseError::UnknownWorkflow(s) => write!(f, "unknown workflow type: {}", s),
            ParseError::UnknownStatus(s) => write!(f, "unknown status: {}", s),
            ParseError::UnknownPriority(s) => write!(f, "unknown priority: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_displays_are_user_safe() {
        let denial = Denial::InvalidActor {
            actor: Role::Manager,
            owner: Role::Controller,
        };
        let text = denial.to_string();
        assert!(text.contains("manager"));
        assert!(text.contains("controller"));
    }

    #[test]
    fn denial_serializes_with_reason_tag() {
        let denial = Denial::TerminalState {
            status: RequestStatus::Completed,
        };
        let json = serde_json::to_value(&denial).unwrap();
        assert_eq!(json["reason"], "terminal_state");
        assert_eq!(json["status"], "completed");
    }
}
