//! Declarative access gate.
//!
//! The predicate ([`is_allowed`]) carries all the policy; [`AccessGuard::render`]
//! is a thin adapter for whatever the UI boundary renders.

use crate::authorize::{has_permission, has_role};
use crate::error::AuthError;
use crate::roles::AssignedRole;

/// True when every supplied requirement holds.
///
/// Requirements narrow access: permission AND role must both pass when both
/// are given. With neither, the gate is an intentional pass-through.
pub fn is_allowed(roles: &[AssignedRole], permission: Option<&str>, role: Option<&str>) -> bool {
    if let Some(key) = permission {
        if !has_permission(roles, key) {
            return false;
        }
    }
    if let Some(name) = role {
        if !has_role(roles, name) {
            return false;
        }
    }
    true
}

/// Reusable gate description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessGuard {
    permission: Option<String>,
    role: Option<String>,
}

impl AccessGuard {
    /// A guard with no requirements (always allows).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_permission(mut self, key: impl Into<String>) -> Self {
        self.permission = Some(key.into());
        self
    }

    pub fn require_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn is_allowed(&self, roles: &[AssignedRole]) -> bool {
        is_allowed(roles, self.permission(), self.role())
    }

    /// Fail with [`AuthError::Forbidden`] naming the unmet requirement.
    pub fn check(&self, roles: &[AssignedRole]) -> Result<(), AuthError> {
        if let Some(key) = self.permission() {
            if !has_permission(roles, key) {
                return Err(AuthError::Forbidden(format!("permission '{key}'")));
            }
        }
        if let Some(name) = self.role() {
            if !has_role(roles, name) {
                return Err(AuthError::Forbidden(format!("role '{name}'")));
            }
        }
        Ok(())
    }

    /// Return `content` when allowed, otherwise `fallback` (nothing by default).
    pub fn render<T>(&self, roles: &[AssignedRole], fallback: Option<T>, content: T) -> Option<T> {
        if self.is_allowed(roles) {
            Some(content)
        } else {
            fallback
        }
    }
}
