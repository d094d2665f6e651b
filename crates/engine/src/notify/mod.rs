//! Assignment notification contract and adapters.
//!
//! When a transition hands a request to a new role, the engine pings that
//! role through a [`NotificationSender`]. Delivery is best-effort: a failed
//! send queues a retry and never rolls back the committed transition.
//!
//! Adapters:
//! - [`LogNotifier`] — emits a structured log event, always succeeds
//! - [`HttpNotifier`] — posts the notification to a webhook endpoint
//! - [`RecordingNotifier`] — captures notifications for tests, with
//!   scriptable failures

pub mod http;
pub mod log;
pub mod recording;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dispatch_core::{Role, WorkflowKind};

pub use http::HttpNotifier;
pub use log::LogNotifier;
pub use recording::RecordingNotifier;

/// A ping telling a role it now owns a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentNotification {
    pub role: Role,
    pub request_id: String,
    pub workflow: WorkflowKind,
}

/// Roles that never receive direct assignment pings. Clients and admins get
/// summary-style messages elsewhere; this list is fixed policy, not
/// per-call configuration.
pub const ASSIGNMENT_EXEMPT_ROLES: [Role; 2] = [Role::Client, Role::Admin];

/// Whether a role is a valid target for an assignment ping.
pub fn role_receives_assignments(role: Role) -> bool {
    !ASSIGNMENT_EXEMPT_ROLES.contains(&role)
}

/// Errors from a notification adapter.
///
/// An adapter returns `Ok(false)` for an ordinary delivery failure (the
/// engine queues a retry) and reserves `Err` for problems a retry cannot
/// fix without intervention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The transport failed in a way that is not a plain refusal.
    Delivery { message: String },
    /// The adapter is misconfigured (bad endpoint, missing credentials).
    Config { message: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Delivery { message } => write!(f, "delivery failed: {}", message),
            NotifyError::Config { message } => write!(f, "notifier misconfigured: {}", message),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Sends assignment notifications to roles.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Deliver an assignment ping. `Ok(false)` means the send failed and
    /// may be retried.
    async fn send_assignment(
        &self,
        notification: &AssignmentNotification,
    ) -> Result<bool, NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_and_admin_are_exempt() {
        assert!(!role_receives_assignments(Role::Client));
        assert!(!role_receives_assignments(Role::Admin));
    }

    #[test]
    fn staff_roles_receive_assignments() {
        for role in [
            Role::Manager,
            Role::JuniorManager,
            Role::Controller,
            Role::Technician,
            Role::Warehouse,
            Role::CallCenter,
            Role::CallCenterSupervisor,
        ] {
            assert!(role_receives_assignments(role), "{role} should be pinged");
        }
    }
}
