//! The closed set of roles that can own or act on a service request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A role in the service organization.
///
/// `role_current` on a request is always exactly one of these values; the
/// workflow definitions reference them as steps. The set is closed so that a
/// typo in a handler cannot invent a new owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Manager,
    JuniorManager,
    Controller,
    Technician,
    Warehouse,
    CallCenter,
    CallCenterSupervisor,
    Admin,
}

impl Role {
    /// All roles, in a stable order.
    pub const ALL: [Role; 9] = [
        Role::Client,
        Role::Manager,
        Role::JuniorManager,
        Role::Controller,
        Role::Technician,
        Role::Warehouse,
        Role::CallCenter,
        Role::CallCenterSupervisor,
        Role::Admin,
    ];

    /// The wire/storage name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Manager => "manager",
            Role::JuniorManager => "junior_manager",
            Role::Controller => "controller",
            Role::Technician => "technician",
            Role::Warehouse => "warehouse",
            Role::CallCenter => "call_center",
            Role::CallCenterSupervisor => "call_center_supervisor",
            Role::Admin => "admin",
        }
    }

    /// Whether this role belongs to staff (anyone but the client).
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Client)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "manager" => Ok(Role::Manager),
            "junior_manager" => Ok(Role::JuniorManager),
            "controller" => Ok(Role::Controller),
            "technician" => Ok(Role::Technician),
            "warehouse" => Ok(Role::Warehouse),
            "call_center" => Ok(Role::CallCenter),
            "call_center_supervisor" => Ok(Role::CallCenterSupervisor),
            "admin" => Ok(Role::Admin),
            other => Err(ParseError::UnknownRole(other.to_string())),
        }
    }
}
