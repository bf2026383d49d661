use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chama_core::{AssignmentId, Entity, PrincipalId, RoleId};

use crate::permissions::PermissionMap;

/// Role name used for RBAC (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

impl RoleName {
    pub const CHAIRMAN: RoleName = RoleName(Cow::Borrowed("chairman"));
    pub const TREASURER: RoleName = RoleName(Cow::Borrowed("treasurer"));
    pub const SECRETARY: RoleName = RoleName(Cow::Borrowed("secretary"));
    pub const MEMBER: RoleName = RoleName(Cow::Borrowed("member"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RoleName {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoleName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A named capability bundle (reference data, created out of band).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: RoleName,
    pub permissions: PermissionMap,
    pub description: Option<String>,
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Link between one principal and one role, revocable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: AssignmentId,
    pub principal_id: PrincipalId,
    pub role_id: RoleId,
    pub is_active: bool,
    pub assigned_at: DateTime<Utc>,
}

impl RoleAssignment {
    pub fn new(principal_id: PrincipalId, role_id: RoleId, assigned_at: DateTime<Utc>) -> Self {
        Self {
            id: AssignmentId::new(),
            principal_id,
            role_id,
            is_active: true,
            assigned_at,
        }
    }
}

/// An active assignment with its role's permission map resolved.
///
/// This is the unit the permission evaluator works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedRole {
    pub assignment_id: AssignmentId,
    pub role_id: RoleId,
    pub name: RoleName,
    pub permissions: PermissionMap,
}

impl AssignedRole {
    pub fn resolve(assignment: &RoleAssignment, role: &Role) -> Self {
        Self {
            assignment_id: assignment.id,
            role_id: role.id,
            name: role.name.clone(),
            permissions: role.permissions.clone(),
        }
    }
}
