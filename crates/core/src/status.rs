//! Request lifecycle status, workflow kinds, priority, and provenance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// The category of service request. Each kind selects exactly one workflow
/// definition from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    ConnectionRequest,
    TechnicalService,
    CallCenterDirect,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 3] = [
        WorkflowKind::ConnectionRequest,
        WorkflowKind::TechnicalService,
        WorkflowKind::CallCenterDirect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::ConnectionRequest => "connection_request",
            WorkflowKind::TechnicalService => "technical_service",
            WorkflowKind::CallCenterDirect => "call_center_direct",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection_request" => Ok(WorkflowKind::ConnectionRequest),
            "technical_service" => Ok(WorkflowKind::TechnicalService),
            "call_center_direct" => Ok(WorkflowKind::CallCenterDirect),
            other => Err(ParseError::UnknownWorkflow(other.to_string())),
        }
    }
}

/// Coarse lifecycle status of a request.
///
/// `Completed` and `Cancelled` are terminal: once reached, no further
/// transitions are accepted (absorbing states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Created,
    InProgress,
    Completed,
    Cancelled,
    OnHold,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Created => "created",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::OnHold => "on_hold",
        }
    }

    /// Terminal statuses are sinks: no transition may leave them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(RequestStatus::Created),
            "in_progress" => Ok(RequestStatus::InProgress),
            "completed" => Ok(RequestStatus::Completed),
            "cancelled" => Ok(RequestStatus::Cancelled),
            "on_hold" => Ok(RequestStatus::OnHold),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// Request priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(ParseError::UnknownPriority(other.to_string())),
        }
    }
}

/// How a request entered the system. Staff-created requests route
/// notifications differently and carry the creating staff member in the
/// audit trail.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CreationSource {
    #[default]
    ClientSelfService,
    StaffOnBehalf,
}

impl CreationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationSource::ClientSelfService => "client_self_service",
            CreationSource::StaffOnBehalf => "staff_on_behalf",
        }
    }
}

impl fmt::Display for CreationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
