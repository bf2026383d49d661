//! Contracts of the remote collaborators.
//!
//! Both stores are remote in production: every call may fail with
//! `AuthError::RemoteUnavailable`, and uniqueness violations surface as
//! `AuthError::DuplicateHandle`.

pub mod faults;
pub mod in_memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use chama_auth::{
    AssignedRole, AuthResult, LoginHandle, NewProfile, Profile, RoleAssignment, Session,
    SessionEvent,
};
use chama_core::{PhoneNumber, PrincipalId, RoleId};

pub use faults::Faults;
pub use in_memory::{InMemoryCredentialStore, InMemoryProfileStore};

/// Ordered stream of session-change notifications.
///
/// Events arrive in the order the credential store emitted them. Dropping the
/// subscription unsubscribes.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { receiver }
    }

    /// Wait for the next event; `None` once the store has gone away.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Metadata stored alongside a credential-store account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMetadata {
    pub phone_number: PhoneNumber,
    pub full_name: String,
}

/// Account creation request.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub handle: LoginHandle,
    pub secret: &'a str,
    /// Skip the provider's own email/SMS confirmation.
    pub confirmed: bool,
    pub metadata: AccountMetadata,
}

/// External identity provider: password verification, sessions, accounts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_current_session(&self) -> AuthResult<Option<Session>>;

    fn subscribe_to_session_changes(&self) -> SessionSubscription;

    async fn sign_in_with_secret(&self, handle: &LoginHandle, secret: &str) -> AuthResult<Session>;

    async fn sign_out(&self) -> AuthResult<()>;

    async fn create_account(&self, account: NewAccount<'_>) -> AuthResult<PrincipalId>;

    /// Remove an account created by a provisioning run that did not complete.
    async fn delete_account(&self, id: PrincipalId) -> AuthResult<()>;

    async fn update_secret(&self, id: PrincipalId, new_secret: &str) -> AuthResult<()>;
}

/// Profile, role and role-assignment tables.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile_by_id(&self, id: PrincipalId) -> AuthResult<Option<Profile>>;

    async fn get_profile_by_phone(&self, phone: &PhoneNumber) -> AuthResult<Option<Profile>>;

    async fn update_last_login(&self, id: PrincipalId, at: DateTime<Utc>) -> AuthResult<()>;

    async fn insert_profile(&self, profile: NewProfile) -> AuthResult<Profile>;

    async fn delete_profile(&self, id: PrincipalId) -> AuthResult<()>;

    async fn mark_password_changed(&self, id: PrincipalId) -> AuthResult<()>;

    async fn set_profile_active(&self, id: PrincipalId, active: bool) -> AuthResult<()>;

    async fn get_role_id_by_name(&self, name: &str) -> AuthResult<Option<RoleId>>;

    async fn insert_role_assignment(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AuthResult<RoleAssignment>;

    /// Flip every active assignment of `role_id` for the principal to inactive.
    async fn deactivate_role_assignments(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AuthResult<usize>;

    async fn list_active_role_assignments_with_roles(
        &self,
        principal_id: PrincipalId,
    ) -> AuthResult<Vec<AssignedRole>>;
}
