//! Principals, roles, and the authorization policy checks.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LifecycleError, LifecycleResult};

/// Caller roles recognized by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Role {
    /// Posts jobs and decides applications.
    #[serde(rename = "professional-body")]
    ProfessionalBody,
    /// Applies to jobs.
    #[serde(rename = "worker")]
    Worker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::ProfessionalBody => "professional-body",
            Role::Worker => "worker",
        }
    }

    /// Parse a role claim. Unknown strings yield `None` rather than a
    /// default; an unrecognized role must fail authentication, not fall
    /// through to some permission set.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "professional-body" => Some(Role::ProfessionalBody),
            "worker" => Some(Role::Worker),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller: identity plus role, as verified upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Gate for operations any principal holding `required` may perform.
    pub fn require_role(&self, required: Role) -> LifecycleResult<()> {
        if self.role == required {
            Ok(())
        } else {
            Err(LifecycleError::AccessDenied)
        }
    }

    /// Gate for operations on an owned resource: the caller must hold
    /// `required` and be the resource owner.
    pub fn require_owner(&self, required: Role, resource_owner: &str) -> LifecycleResult<()> {
        self.require_role(required)?;
        if self.id == resource_owner {
            Ok(())
        } else {
            Err(LifecycleError::AccessDenied)
        }
    }
}
