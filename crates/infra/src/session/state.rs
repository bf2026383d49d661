//! Snapshot of "who is signed in" shared with readers.

use std::collections::VecDeque;

use serde::Serialize;

use chama_auth::{
    AssignedRole, AuthError, AuthorizationExplanation, Profile, RoleName, Session,
    explain_authorization, has_permission, has_role,
};
use chama_core::{PrincipalId, SessionId};

use super::loader::Hydrated;

/// Progress of loading the profile/roles for the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum HydrationStatus {
    /// No session.
    Idle,
    Pending,
    Ready,
    Failed(AuthError),
}

impl HydrationStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, HydrationStatus::Pending)
    }
}

/// Immutable view of the authentication state.
///
/// Invariant: without a session there is no profile and no role. Only the
/// transition methods below (crate-private) can produce new states, and each
/// of them keeps the invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthState {
    session: Option<Session>,
    profile: Option<Profile>,
    roles: Vec<AssignedRole>,
    loading: bool,
    hydration: HydrationStatus,
    /// Bumped by every transition that invalidates in-flight hydrations.
    #[serde(skip)]
    epoch: u64,
    /// Most recent sessions replaced or cleared, newest last.
    #[serde(skip)]
    retired: VecDeque<SessionId>,
}

/// How many replaced sessions are remembered for waiting sign-ins.
const RETIRED_SESSIONS: usize = 32;

impl AuthState {
    /// Before `initialize` has run.
    pub(crate) fn initial() -> Self {
        Self {
            session: None,
            profile: None,
            roles: Vec::new(),
            loading: true,
            hydration: HydrationStatus::Idle,
            epoch: 0,
            retired: VecDeque::new(),
        }
    }

    /// Drop the session. Returns the new epoch.
    pub(crate) fn clear(&mut self) -> u64 {
        if let Some(previous) = self.session.take() {
            self.retire(previous.id);
        }
        self.profile = None;
        self.roles.clear();
        self.hydration = HydrationStatus::Idle;
        self.bump()
    }

    /// Adopt a session and drop whatever was cached for the previous one.
    /// Returns the epoch a hydration result must match to be applied, or
    /// `None` for a session that was already signed out or replaced.
    pub(crate) fn begin_hydration(&mut self, session: Session) -> Option<u64> {
        let incoming = session.id;
        if self.has_retired(incoming) {
            return None;
        }
        if let Some(previous) = self.session.replace(session) {
            if previous.id != incoming {
                self.retire(previous.id);
            }
        }
        self.profile = None;
        self.roles.clear();
        self.hydration = HydrationStatus::Pending;
        Some(self.bump())
    }

    fn bump(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn retire(&mut self, id: SessionId) {
        if self.retired.len() == RETIRED_SESSIONS {
            self.retired.pop_front();
        }
        self.retired.push_back(id);
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The session was current at some point and has since been replaced.
    pub(crate) fn has_retired(&self, id: SessionId) -> bool {
        self.retired.contains(&id)
    }

    pub(crate) fn finish_hydration(&mut self, hydrated: Hydrated) {
        if self.session.is_none() {
            return;
        }
        self.profile = Some(hydrated.profile);
        self.roles = hydrated.roles;
        self.hydration = HydrationStatus::Ready;
    }

    pub(crate) fn fail_hydration(&mut self, error: AuthError) {
        if self.session.is_none() {
            return;
        }
        self.profile = None;
        self.roles.clear();
        self.hydration = HydrationStatus::Failed(error);
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.loading = false;
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn roles(&self) -> &[AssignedRole] {
        &self.roles
    }

    /// True until `initialize` has finished once.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn hydration(&self) -> &HydrationStatus {
        &self.hydration
    }

    pub fn principal_id(&self) -> Option<PrincipalId> {
        self.session.as_ref().map(|s| s.principal_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// The principal must replace its temporary password.
    pub fn must_change_password(&self) -> bool {
        self.profile
            .as_ref()
            .is_some_and(|p| p.must_change_password)
    }

    pub fn has_permission(&self, key: &str) -> bool {
        has_permission(&self.roles, key)
    }

    pub fn has_role(&self, role_name: &str) -> bool {
        has_role(&self.roles, role_name)
    }

    pub fn is_chairman(&self) -> bool {
        self.has_role(RoleName::CHAIRMAN.as_str())
    }

    pub fn is_treasurer(&self) -> bool {
        self.has_role(RoleName::TREASURER.as_str())
    }

    pub fn is_secretary(&self) -> bool {
        self.has_role(RoleName::SECRETARY.as_str())
    }

    pub fn is_member(&self) -> bool {
        self.has_role(RoleName::MEMBER.as_str())
    }

    pub fn explain(&self, key: &str) -> AuthorizationExplanation {
        explain_authorization(&self.roles, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chama_auth::{LoginHandle, PermissionMap};
    use chama_core::{AssignmentId, PhoneNumber, RoleId, SessionId};
    use chrono::{Duration, Utc};

    fn session() -> Session {
        let now = Utc::now();
        Session {
            id: SessionId::new(),
            principal_id: PrincipalId::new(),
            handle: LoginHandle::from_raw("0712345678@savingsgroup.local"),
            issued_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    fn hydrated(id: PrincipalId) -> Hydrated {
        Hydrated {
            profile: Profile {
                id,
                phone_number: PhoneNumber::parse("0712345678").unwrap(),
                full_name: "Njeri".to_string(),
                is_active: true,
                must_change_password: true,
                last_login: None,
            },
            roles: vec![AssignedRole {
                assignment_id: AssignmentId::new(),
                role_id: RoleId::new(),
                name: RoleName::CHAIRMAN,
                permissions: PermissionMap::new().grant("members", ["create"]).unwrap(),
            }],
        }
    }

    #[test]
    fn clear_empties_everything() {
        let mut state = AuthState::initial();
        let s = session();
        let id = s.principal_id;
        state.begin_hydration(s);
        state.finish_hydration(hydrated(id));
        assert!(state.is_chairman());
        assert!(state.must_change_password());

        state.clear();
        assert!(state.session().is_none());
        assert!(state.profile().is_none());
        assert!(state.roles().is_empty());
        assert_eq!(state.hydration(), &HydrationStatus::Idle);
    }

    #[test]
    fn hydration_result_without_session_is_ignored() {
        let mut state = AuthState::initial();
        state.finish_hydration(hydrated(PrincipalId::new()));
        assert!(state.profile().is_none());
        assert!(state.roles().is_empty());

        state.fail_hydration(AuthError::remote("down"));
        assert_eq!(state.hydration(), &HydrationStatus::Idle);
    }

    #[test]
    fn new_session_discards_previous_snapshot() {
        let mut state = AuthState::initial();
        let first = session();
        let id = first.principal_id;
        state.begin_hydration(first);
        state.finish_hydration(hydrated(id));

        state.begin_hydration(session());
        assert!(state.profile().is_none());
        assert!(state.roles().is_empty());
        assert!(state.hydration().is_pending());
    }

    #[test]
    fn every_transition_moves_the_epoch() {
        let mut state = AuthState::initial();
        let s = session();

        let first = state.begin_hydration(s.clone()).unwrap();
        let again = state.begin_hydration(s.clone()).unwrap();
        assert!(again > first);
        assert!(!state.has_retired(s.id));

        let cleared = state.clear();
        assert!(cleared > again);
        assert_eq!(state.epoch(), cleared);
    }

    #[test]
    fn signed_out_session_is_never_adopted_again() {
        let mut state = AuthState::initial();
        let s = session();
        state.begin_hydration(s.clone());
        state.clear();
        let epoch = state.epoch();

        assert!(state.has_retired(s.id));
        assert_eq!(state.begin_hydration(s), None);
        assert!(!state.is_authenticated());
        assert_eq!(state.epoch(), epoch);
    }

    #[test]
    fn replaced_session_is_retired() {
        let mut state = AuthState::initial();
        let first = session();
        let second = session();
        state.begin_hydration(first.clone());
        state.begin_hydration(second.clone());

        assert!(state.has_retired(first.id));
        assert!(!state.has_retired(second.id));
    }

    #[test]
    fn retired_history_is_bounded() {
        let mut state = AuthState::initial();
        let oldest = session();
        state.begin_hydration(oldest.clone());
        for _ in 0..=RETIRED_SESSIONS {
            state.begin_hydration(session());
        }
        assert!(!state.has_retired(oldest.id));
        assert_eq!(state.retired.len(), RETIRED_SESSIONS);
    }
}
