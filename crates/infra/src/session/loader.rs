//! Profile/role hydration for a principal.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use chama_auth::{AssignedRole, AuthError, AuthResult, Profile};
use chama_core::PrincipalId;

use crate::store::ProfileStore;

/// Result of loading a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hydrated {
    pub profile: Profile,
    /// Active assignments only; empty is a valid "no permissions yet" state.
    pub roles: Vec<AssignedRole>,
}

pub struct ProfileLoader {
    profiles: Arc<dyn ProfileStore>,
}

impl ProfileLoader {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// Load the profile and active roles, then stamp the last-login time.
    ///
    /// The stamp is best effort: a failed write is logged and the load still
    /// succeeds with the previous `last_login`.
    pub async fn load(&self, principal_id: PrincipalId) -> AuthResult<Hydrated> {
        let mut profile = self
            .profiles
            .get_profile_by_id(principal_id)
            .await?
            .ok_or(AuthError::ProfileNotFound(principal_id))?;

        let roles = self
            .profiles
            .list_active_role_assignments_with_roles(principal_id)
            .await?;

        let now = Utc::now();
        match self.profiles.update_last_login(principal_id, now).await {
            Ok(()) => profile.last_login = Some(now),
            Err(e) => warn!(%principal_id, error = %e, "failed to stamp last login"),
        }

        debug!(%principal_id, roles = roles.len(), "profile hydrated");
        Ok(Hydrated { profile, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProfileStore;
    use crate::store::in_memory::ProfileOp;
    use chama_auth::NewProfile;
    use chama_core::PhoneNumber;

    async fn store_with_profile() -> (Arc<InMemoryProfileStore>, PrincipalId) {
        let store = Arc::new(InMemoryProfileStore::with_default_roles());
        let id = PrincipalId::new();
        store
            .insert_profile(NewProfile {
                id,
                phone_number: PhoneNumber::parse("0712345678").unwrap(),
                full_name: "Kiprop".to_string(),
            })
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn missing_profile_is_profile_not_found() {
        let store = Arc::new(InMemoryProfileStore::new());
        let loader = ProfileLoader::new(store);
        let id = PrincipalId::new();
        assert_eq!(loader.load(id).await, Err(AuthError::ProfileNotFound(id)));
    }

    #[tokio::test]
    async fn no_assignments_is_an_empty_role_set() {
        let (store, id) = store_with_profile().await;
        let loaded = ProfileLoader::new(store.clone()).load(id).await.unwrap();
        assert!(loaded.roles.is_empty());
        assert!(loaded.profile.last_login.is_some());
        assert_eq!(store.profile(id).unwrap().last_login, loaded.profile.last_login);
    }

    #[tokio::test]
    async fn last_login_failure_does_not_fail_the_load() {
        let (store, id) = store_with_profile().await;
        store
            .faults()
            .fail(ProfileOp::UpdateLastLogin, AuthError::remote("timeout"));

        let loaded = ProfileLoader::new(store.clone()).load(id).await.unwrap();
        assert!(loaded.profile.last_login.is_none());
        assert!(store.profile(id).unwrap().last_login.is_none());
    }

    #[tokio::test]
    async fn role_listing_failure_propagates() {
        let (store, id) = store_with_profile().await;
        store
            .faults()
            .fail(ProfileOp::ListActiveRoleAssignments, AuthError::remote("down"));
        assert_eq!(
            ProfileLoader::new(store).load(id).await,
            Err(AuthError::remote("down"))
        );
    }
}
