//! In-memory stores for tests/dev.
//!
//! - No IO
//! - Failure injection per operation through [`Faults`]
//! - Lock poisoning surfaces as `RemoteUnavailable`

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;

use chama_auth::{
    AssignedRole, AuthError, AuthResult, LoginHandle, NewProfile, PermissionMap, Profile, Role,
    RoleAssignment, RoleName, Session, SessionEvent, default_roles,
};
use chama_core::{PhoneNumber, PrincipalId, RoleId, SessionId};

use super::faults::Faults;
use super::{AccountMetadata, CredentialStore, NewAccount, ProfileStore, SessionSubscription};

fn read<'a, T>(lock: &'a RwLock<T>, store: &str) -> AuthResult<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| AuthError::remote(format!("{store} lock poisoned")))
}

fn write<'a, T>(lock: &'a RwLock<T>, store: &str) -> AuthResult<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| AuthError::remote(format!("{store} lock poisoned")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Credential store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialOp {
    GetCurrentSession,
    SignIn,
    SignOut,
    CreateAccount,
    DeleteAccount,
    UpdateSecret,
}

#[derive(Debug, Clone)]
struct Account {
    id: PrincipalId,
    handle: LoginHandle,
    secret: String,
    confirmed: bool,
    metadata: AccountMetadata,
}

#[derive(Debug, Default)]
struct CredentialState {
    accounts: HashMap<PrincipalId, Account>,
    current: Option<Session>,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl CredentialState {
    fn find_by_handle(&self, handle: &LoginHandle) -> Option<&Account> {
        self.accounts.values().find(|a| &a.handle == handle)
    }

    /// Record the new current session and fan the change out in order.
    fn publish(&mut self, event: SessionEvent) {
        self.current = event.session.clone();
        // Drop any dead subscribers while publishing.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// In-memory identity provider holding one client context's session.
#[derive(Debug)]
pub struct InMemoryCredentialStore {
    state: RwLock<CredentialState>,
    faults: Faults<CredentialOp>,
    session_ttl: Duration,
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self {
            state: RwLock::new(CredentialState::default()),
            faults: Faults::default(),
            session_ttl: Duration::hours(1),
        }
    }
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn faults(&self) -> &Faults<CredentialOp> {
        &self.faults
    }

    fn issue_session(&self, account: &Account) -> Session {
        let issued_at = Utc::now();
        Session {
            id: SessionId::new(),
            principal_id: account.id,
            handle: account.handle.clone(),
            issued_at,
            expires_at: issued_at + self.session_ttl,
        }
    }

    /// Push an externally triggered change (e.g. sign-out from another tab).
    pub fn emit(&self, event: SessionEvent) -> AuthResult<()> {
        write(&self.state, "credential store")?.publish(event);
        Ok(())
    }

    /// Re-issue the current session for the same principal.
    pub fn refresh_current(&self) -> AuthResult<Option<Session>> {
        let mut state = write(&self.state, "credential store")?;
        let Some(current) = state.current.clone() else {
            return Ok(None);
        };
        let Some(account) = state.accounts.get(&current.principal_id).cloned() else {
            return Ok(None);
        };
        let session = self.issue_session(&account);
        state.publish(SessionEvent::refreshed(session.clone()));
        Ok(Some(session))
    }

    /// Drop the current session as if its token lapsed.
    pub fn expire_current(&self) -> AuthResult<()> {
        write(&self.state, "credential store")?.publish(SessionEvent::expired());
        Ok(())
    }

    /// Start a session without emitting an event, as if restored from storage.
    pub fn restore_session(&self, id: PrincipalId) -> AuthResult<Option<Session>> {
        let mut state = write(&self.state, "credential store")?;
        let Some(account) = state.accounts.get(&id).cloned() else {
            return Ok(None);
        };
        let session = self.issue_session(&account);
        state.current = Some(session.clone());
        Ok(Some(session))
    }

    pub fn account_by_handle(&self, handle: &LoginHandle) -> Option<PrincipalId> {
        let state = self.state.read().ok()?;
        state.find_by_handle(handle).map(|a| a.id)
    }

    pub fn account_metadata(&self, id: PrincipalId) -> Option<AccountMetadata> {
        let state = self.state.read().ok()?;
        state.accounts.get(&id).map(|a| a.metadata.clone())
    }

    pub fn account_count(&self) -> usize {
        self.state.read().map(|s| s.accounts.len()).unwrap_or(0)
    }

    pub fn current(&self) -> Option<Session> {
        self.state.read().ok().and_then(|s| s.current.clone())
    }

    pub fn secret_matches(&self, id: PrincipalId, secret: &str) -> bool {
        self.state
            .read()
            .ok()
            .and_then(|s| s.accounts.get(&id).map(|a| a.secret == secret))
            .unwrap_or(false)
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_current_session(&self) -> AuthResult<Option<Session>> {
        self.faults.check(CredentialOp::GetCurrentSession)?;
        Ok(read(&self.state, "credential store")?.current.clone())
    }

    fn subscribe_to_session_changes(&self) -> SessionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();

        // If the lock is poisoned, we still return a subscription;
        // it just never receives events.
        if let Ok(mut state) = self.state.write() {
            state.subscribers.push(tx);
        }

        SessionSubscription::new(rx)
    }

    async fn sign_in_with_secret(&self, handle: &LoginHandle, secret: &str) -> AuthResult<Session> {
        self.faults.check(CredentialOp::SignIn)?;

        let mut state = write(&self.state, "credential store")?;
        let account = match state.find_by_handle(handle) {
            Some(account) if account.confirmed && account.secret == secret => account.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };

        let session = self.issue_session(&account);
        state.publish(SessionEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.faults.check(CredentialOp::SignOut)?;
        write(&self.state, "credential store")?.publish(SessionEvent::signed_out());
        Ok(())
    }

    async fn create_account(&self, account: NewAccount<'_>) -> AuthResult<PrincipalId> {
        self.faults.check(CredentialOp::CreateAccount)?;

        let mut state = write(&self.state, "credential store")?;
        if state.find_by_handle(&account.handle).is_some() {
            return Err(AuthError::DuplicateHandle(account.handle.to_string()));
        }

        let id = PrincipalId::new();
        state.accounts.insert(
            id,
            Account {
                id,
                handle: account.handle,
                secret: account.secret.to_string(),
                confirmed: account.confirmed,
                metadata: account.metadata,
            },
        );
        Ok(id)
    }

    async fn delete_account(&self, id: PrincipalId) -> AuthResult<()> {
        self.faults.check(CredentialOp::DeleteAccount)?;
        write(&self.state, "credential store")?.accounts.remove(&id);
        Ok(())
    }

    async fn update_secret(&self, id: PrincipalId, new_secret: &str) -> AuthResult<()> {
        self.faults.check(CredentialOp::UpdateSecret)?;
        let mut state = write(&self.state, "credential store")?;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(AuthError::InvalidCredentials)?;
        account.secret = new_secret.to_string();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileOp {
    GetProfileById,
    GetProfileByPhone,
    UpdateLastLogin,
    InsertProfile,
    DeleteProfile,
    MarkPasswordChanged,
    SetProfileActive,
    GetRoleIdByName,
    InsertRoleAssignment,
    DeactivateRoleAssignments,
    ListActiveRoleAssignments,
}

#[derive(Debug, Default)]
struct ProfileTables {
    profiles: HashMap<PrincipalId, Profile>,
    roles: HashMap<RoleId, Role>,
    assignments: Vec<RoleAssignment>,
}

/// In-memory profile, role and role-assignment tables.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    tables: RwLock<ProfileTables>,
    faults: Faults<ProfileOp>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeded with the default role catalogue.
    pub fn with_default_roles() -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.write() {
            for role in default_roles() {
                tables.roles.insert(role.id, role);
            }
        }
        store
    }

    pub fn faults(&self) -> &Faults<ProfileOp> {
        &self.faults
    }

    /// Add or replace a role definition (reference data).
    pub fn define_role(&self, name: RoleName, permissions: PermissionMap) -> AuthResult<RoleId> {
        let mut tables = write(&self.tables, "profile store")?;
        let id = tables
            .roles
            .values()
            .find(|r| r.name == name)
            .map(|r| r.id)
            .unwrap_or_default();
        tables.roles.insert(
            id,
            Role {
                id,
                name,
                permissions,
                description: None,
            },
        );
        Ok(id)
    }

    pub fn seed_profile(&self, profile: Profile) -> AuthResult<()> {
        write(&self.tables, "profile store")?
            .profiles
            .insert(profile.id, profile);
        Ok(())
    }

    pub fn profile(&self, id: PrincipalId) -> Option<Profile> {
        self.tables.read().ok()?.profiles.get(&id).cloned()
    }

    pub fn profile_count(&self) -> usize {
        self.tables.read().map(|t| t.profiles.len()).unwrap_or(0)
    }

    pub fn assignments_for(&self, id: PrincipalId) -> Vec<RoleAssignment> {
        match self.tables.read() {
            Ok(tables) => tables
                .assignments
                .iter()
                .filter(|a| a.principal_id == id)
                .cloned()
                .collect(),
            Err(_) => vec![],
        }
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile_by_id(&self, id: PrincipalId) -> AuthResult<Option<Profile>> {
        self.faults.check(ProfileOp::GetProfileById)?;
        Ok(read(&self.tables, "profile store")?.profiles.get(&id).cloned())
    }

    async fn get_profile_by_phone(&self, phone: &PhoneNumber) -> AuthResult<Option<Profile>> {
        self.faults.check(ProfileOp::GetProfileByPhone)?;
        Ok(read(&self.tables, "profile store")?
            .profiles
            .values()
            .find(|p| &p.phone_number == phone)
            .cloned())
    }

    async fn update_last_login(&self, id: PrincipalId, at: DateTime<Utc>) -> AuthResult<()> {
        self.faults.check(ProfileOp::UpdateLastLogin)?;
        if let Some(profile) = write(&self.tables, "profile store")?.profiles.get_mut(&id) {
            profile.last_login = Some(at);
        }
        Ok(())
    }

    async fn insert_profile(&self, profile: NewProfile) -> AuthResult<Profile> {
        self.faults.check(ProfileOp::InsertProfile)?;

        let mut tables = write(&self.tables, "profile store")?;
        let taken = tables.profiles.values().any(|p| {
            p.id == profile.id || p.phone_number == profile.phone_number
        });
        if taken {
            return Err(AuthError::DuplicateHandle(profile.phone_number.to_string()));
        }

        let profile = profile.into_profile();
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn delete_profile(&self, id: PrincipalId) -> AuthResult<()> {
        self.faults.check(ProfileOp::DeleteProfile)?;
        let mut tables = write(&self.tables, "profile store")?;
        tables.profiles.remove(&id);
        tables.assignments.retain(|a| a.principal_id != id);
        Ok(())
    }

    async fn mark_password_changed(&self, id: PrincipalId) -> AuthResult<()> {
        self.faults.check(ProfileOp::MarkPasswordChanged)?;
        let mut tables = write(&self.tables, "profile store")?;
        let profile = tables
            .profiles
            .get_mut(&id)
            .ok_or(AuthError::ProfileNotFound(id))?;
        profile.must_change_password = false;
        Ok(())
    }

    async fn set_profile_active(&self, id: PrincipalId, active: bool) -> AuthResult<()> {
        self.faults.check(ProfileOp::SetProfileActive)?;
        let mut tables = write(&self.tables, "profile store")?;
        let profile = tables
            .profiles
            .get_mut(&id)
            .ok_or(AuthError::ProfileNotFound(id))?;
        profile.is_active = active;
        Ok(())
    }

    async fn get_role_id_by_name(&self, name: &str) -> AuthResult<Option<RoleId>> {
        self.faults.check(ProfileOp::GetRoleIdByName)?;
        Ok(read(&self.tables, "profile store")?
            .roles
            .values()
            .find(|r| r.name.as_str() == name)
            .map(|r| r.id))
    }

    async fn insert_role_assignment(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AuthResult<RoleAssignment> {
        self.faults.check(ProfileOp::InsertRoleAssignment)?;

        let mut tables = write(&self.tables, "profile store")?;
        if !tables.profiles.contains_key(&principal_id) {
            return Err(AuthError::ProfileNotFound(principal_id));
        }
        if !tables.roles.contains_key(&role_id) {
            return Err(AuthError::RoleNotFound(role_id.to_string()));
        }

        let assignment = RoleAssignment::new(principal_id, role_id, Utc::now());
        tables.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn deactivate_role_assignments(
        &self,
        principal_id: PrincipalId,
        role_id: RoleId,
    ) -> AuthResult<usize> {
        self.faults.check(ProfileOp::DeactivateRoleAssignments)?;

        let mut tables = write(&self.tables, "profile store")?;
        let mut changed = 0;
        for assignment in tables
            .assignments
            .iter_mut()
            .filter(|a| a.principal_id == principal_id && a.role_id == role_id && a.is_active)
        {
            assignment.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn list_active_role_assignments_with_roles(
        &self,
        principal_id: PrincipalId,
    ) -> AuthResult<Vec<AssignedRole>> {
        self.faults.check(ProfileOp::ListActiveRoleAssignments)?;

        let tables = read(&self.tables, "profile store")?;
        let mut active: Vec<&RoleAssignment> = tables
            .assignments
            .iter()
            .filter(|a| a.principal_id == principal_id && a.is_active)
            .collect();
        active.sort_by_key(|a| a.assigned_at);

        Ok(active
            .into_iter()
            .filter_map(|a| tables.roles.get(&a.role_id).map(|role| AssignedRole::resolve(a, role)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(phone: &str) -> AccountMetadata {
        AccountMetadata {
            phone_number: PhoneNumber::parse(phone).unwrap(),
            full_name: "Wanjiru Kamau".to_string(),
        }
    }

    fn handle(phone: &str) -> LoginHandle {
        LoginHandle::derive(&PhoneNumber::parse(phone).unwrap(), "savingsgroup.local")
    }

    #[tokio::test]
    async fn sign_in_publishes_to_subscribers_in_order() {
        let store = InMemoryCredentialStore::new();
        let mut subscription = store.subscribe_to_session_changes();
        store
            .create_account(NewAccount {
                handle: handle("0712345678"),
                secret: "123456",
                confirmed: true,
                metadata: metadata("0712345678"),
            })
            .await
            .unwrap();

        let session = store.sign_in_with_secret(&handle("0712345678"), "123456").await.unwrap();
        store.sign_out().await.unwrap();

        assert_eq!(subscription.recv().await.unwrap().session, Some(session));
        assert_eq!(subscription.recv().await.unwrap().session, None);
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn wrong_secret_and_unknown_handle_are_invalid_credentials() {
        let store = InMemoryCredentialStore::new();
        store
            .create_account(NewAccount {
                handle: handle("0712345678"),
                secret: "123456",
                confirmed: true,
                metadata: metadata("0712345678"),
            })
            .await
            .unwrap();

        assert_eq!(
            store.sign_in_with_secret(&handle("0712345678"), "000000").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            store.sign_in_with_secret(&handle("0799999999"), "123456").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn duplicate_handle_is_a_conflict() {
        let store = InMemoryCredentialStore::new();
        let account = || NewAccount {
            handle: handle("0712345678"),
            secret: "123456",
            confirmed: true,
            metadata: metadata("0712345678"),
        };
        store.create_account(account()).await.unwrap();
        assert!(matches!(
            store.create_account(account()).await,
            Err(AuthError::DuplicateHandle(_))
        ));
        assert_eq!(store.account_count(), 1);
    }

    #[tokio::test]
    async fn listing_skips_inactive_assignments() {
        let store = InMemoryProfileStore::with_default_roles();
        let id = PrincipalId::new();
        store
            .insert_profile(NewProfile {
                id,
                phone_number: PhoneNumber::parse("0712345678").unwrap(),
                full_name: "Otieno".to_string(),
            })
            .await
            .unwrap();

        let treasurer = store.get_role_id_by_name("treasurer").await.unwrap().unwrap();
        let member = store.get_role_id_by_name("member").await.unwrap().unwrap();
        store.insert_role_assignment(id, treasurer).await.unwrap();
        store.insert_role_assignment(id, member).await.unwrap();
        assert_eq!(store.deactivate_role_assignments(id, treasurer).await.unwrap(), 1);

        let roles = store.list_active_role_assignments_with_roles(id).await.unwrap();
        let names: Vec<&str> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["member"]);
    }

    #[tokio::test]
    async fn insert_profile_rejects_duplicate_phone() {
        let store = InMemoryProfileStore::new();
        let new = |id| NewProfile {
            id,
            phone_number: PhoneNumber::parse("0712345678").unwrap(),
            full_name: "Achieng".to_string(),
        };
        let created = store.insert_profile(new(PrincipalId::new())).await.unwrap();
        assert!(created.is_active);
        assert!(created.must_change_password);

        assert_eq!(
            store.insert_profile(new(PrincipalId::new())).await,
            Err(AuthError::DuplicateHandle("0712345678".to_string()))
        );
    }

    #[tokio::test]
    async fn injected_faults_short_circuit() {
        let store = InMemoryProfileStore::new();
        store
            .faults()
            .fail(ProfileOp::GetProfileById, AuthError::remote("offline"));
        assert_eq!(
            store.get_profile_by_id(PrincipalId::new()).await,
            Err(AuthError::remote("offline"))
        );
    }
}
