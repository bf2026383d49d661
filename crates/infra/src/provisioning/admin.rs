//! Role administration behind the administrator guard.

use std::sync::Arc;

use tracing::{info, warn};

use chama_auth::{AccessGuard, AuthError, AuthResult, RoleAssignment};
use chama_core::{PrincipalId, RoleId};

use crate::config::AuthConfig;
use crate::session::AuthState;
use crate::store::ProfileStore;

pub struct RoleAdministration {
    profiles: Arc<dyn ProfileStore>,
    config: AuthConfig,
}

impl RoleAdministration {
    pub fn new(profiles: Arc<dyn ProfileStore>, config: AuthConfig) -> Self {
        Self { profiles, config }
    }

    fn authorize(&self, actor: &AuthState) -> AuthResult<()> {
        if !actor.is_authenticated() {
            return Err(AuthError::NotAuthenticated);
        }
        AccessGuard::new()
            .require_role(self.config.administrator_role.clone())
            .check(actor.roles())
            .inspect_err(|_| warn!(actor = ?actor.principal_id(), "role administration denied"))
    }

    async fn existing_principal(&self, principal: PrincipalId) -> AuthResult<()> {
        match self.profiles.get_profile_by_id(principal).await? {
            Some(_) => Ok(()),
            None => Err(AuthError::ProfileNotFound(principal)),
        }
    }

    async fn role_id(&self, role_name: &str) -> AuthResult<RoleId> {
        self.profiles
            .get_role_id_by_name(role_name)
            .await?
            .ok_or_else(|| AuthError::RoleNotFound(role_name.to_string()))
    }

    /// Insert an active assignment of `role_name`.
    pub async fn assign_role(
        &self,
        actor: &AuthState,
        principal: PrincipalId,
        role_name: &str,
    ) -> AuthResult<RoleAssignment> {
        self.authorize(actor)?;
        self.existing_principal(principal).await?;
        let role_id = self.role_id(role_name).await?;
        let assignment = self
            .profiles
            .insert_role_assignment(principal, role_id)
            .await?;
        info!(%principal, role = role_name, "role assigned");
        Ok(assignment)
    }

    /// Deactivate every active assignment of `role_name`; returns how many changed.
    pub async fn revoke_role(
        &self,
        actor: &AuthState,
        principal: PrincipalId,
        role_name: &str,
    ) -> AuthResult<usize> {
        self.authorize(actor)?;
        let role_id = self.role_id(role_name).await?;
        let revoked = self
            .profiles
            .deactivate_role_assignments(principal, role_id)
            .await?;
        info!(%principal, role = role_name, revoked, "role revoked");
        Ok(revoked)
    }

    /// Flip the member's active flag off. Nothing is deleted.
    pub async fn deactivate_member(&self, actor: &AuthState, principal: PrincipalId) -> AuthResult<()> {
        self.authorize(actor)?;
        if actor.principal_id() == Some(principal) {
            return Err(AuthError::validation("cannot deactivate your own account"));
        }
        self.profiles.set_profile_active(principal, false).await?;
        info!(%principal, "member deactivated");
        Ok(())
    }
}
