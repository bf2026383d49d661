//! Session manager: the single writer of [`AuthState`].
//!
//! Session-change notifications are consumed by one background task, strictly
//! in emission order. Every transition (change event, refresh, sign-out) bumps
//! the epoch stored in [`AuthState`], inside the same watch update that
//! performs the transition. A hydration result is only applied while its
//! epoch is current, so a newer change always wins over an in-flight load.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chama_auth::{AuthError, AuthResult, LoginHandle, Session, SessionEvent};
use chama_core::PhoneNumber;

use crate::config::AuthConfig;
use crate::store::{CredentialStore, ProfileStore, SessionSubscription};

use super::loader::ProfileLoader;
use super::state::{AuthState, HydrationStatus};

/// Outcome of [`SessionManager::sign_out`].
///
/// Local state is already cleared; `warning` carries a remote failure that
/// the caller may want to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SignOutReport {
    pub warning: Option<AuthError>,
}

pub struct SessionManager {
    credentials: Arc<dyn CredentialStore>,
    profiles: Arc<dyn ProfileStore>,
    loader: ProfileLoader,
    config: AuthConfig,
    state: watch::Sender<AuthState>,
    initialized: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        profiles: Arc<dyn ProfileStore>,
        config: AuthConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::initial());
        Arc::new(Self {
            loader: ProfileLoader::new(Arc::clone(&profiles)),
            credentials,
            profiles,
            config,
            state,
            initialized: AtomicBool::new(false),
            listener: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Current snapshot (profile and roles always from the same transition).
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every state transition.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Hydrate any existing session and start consuming change events.
    ///
    /// Loading is marked complete exactly once, whatever happens. Calling
    /// this again is a no-op.
    pub async fn initialize(self: &Arc<Self>) -> AuthResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Subscribe first so nothing emitted during hydration is missed.
        let subscription = self.credentials.subscribe_to_session_changes();

        let current = self.credentials.get_current_session().await;
        match &current {
            Ok(Some(session)) => {
                info!(principal_id = %session.principal_id, "restoring existing session");
                self.adopt_session(session.clone()).await;
            }
            Ok(None) => debug!("no existing session"),
            Err(e) => warn!(error = %e, "failed to fetch existing session"),
        }

        self.state.send_modify(AuthState::mark_loaded);

        let handle = tokio::spawn(Self::listen(Arc::downgrade(self), subscription));
        if let Ok(mut listener) = self.listener.lock() {
            *listener = Some(handle);
        }

        current.map(|_| ())
    }

    /// Stop consuming session-change events.
    pub fn teardown(&self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
                info!("session listener stopped");
            }
        }
        self.initialized.store(false, Ordering::SeqCst);
    }

    async fn listen(manager: Weak<Self>, mut subscription: SessionSubscription) {
        while let Some(event) = subscription.recv().await {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            manager.on_session_changed(event).await;
        }
        debug!("session subscription closed");
    }

    /// Apply one session-change notification.
    pub async fn on_session_changed(&self, event: SessionEvent) {
        debug!(kind = ?event.kind, "session changed");
        match event.session {
            Some(session) => self.adopt_session(session).await,
            None => self.state.send_modify(|state| {
                state.clear();
            }),
        }
    }

    async fn adopt_session(&self, session: Session) {
        let mut epoch = None;
        self.state.send_if_modified(|state| {
            epoch = state.begin_hydration(session.clone());
            epoch.is_some()
        });
        match epoch {
            Some(epoch) => self.hydrate(epoch, session).await,
            None => debug!(session_id = %session.id, "ignoring retired session"),
        }
    }

    async fn hydrate(&self, epoch: u64, session: Session) {
        let session_id = session.id;
        let outcome = self.loader.load(session.principal_id).await;

        self.state.send_if_modified(|state| {
            let current = state.session().map(|s| s.id) == Some(session_id);
            if state.epoch() != epoch || !current {
                debug!(%session_id, "discarding stale hydration");
                return false;
            }
            match outcome {
                Ok(hydrated) => state.finish_hydration(hydrated),
                Err(e) => {
                    warn!(principal_id = %session.principal_id, error = %e, "hydration failed");
                    state.fail_hydration(e);
                }
            }
            true
        });
    }

    /// Sign in with a phone number and secret.
    ///
    /// Hydration is done by the change listener; this waits for it to settle
    /// and surfaces its error. A rejected lookup or credential check leaves the
    /// state untouched. A failed hydration leaves the session adopted with
    /// [`HydrationStatus::Failed`] and no profile or roles. If a sign-out or
    /// another principal's session replaces this one before hydration
    /// settles, the result is [`AuthError::NotAuthenticated`].
    pub async fn sign_in(&self, phone_number: &str, secret: &str) -> AuthResult<()> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(AuthError::NotInitialized);
        }

        let phone = PhoneNumber::parse(phone_number).map_err(|_| AuthError::InvalidCredentials)?;
        let profile = self
            .profiles
            .get_profile_by_phone(&phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !profile.is_active {
            warn!(principal_id = %profile.id, "sign-in attempt on suspended account");
            return Err(AuthError::AccountSuspended);
        }

        let handle = LoginHandle::derive(&phone, &self.config.login_domain);
        let session = self.credentials.sign_in_with_secret(&handle, secret).await?;

        self.await_hydration(&session).await?;
        info!(principal_id = %session.principal_id, "signed in");
        Ok(())
    }

    async fn await_hydration(&self, session: &Session) -> AuthResult<()> {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|state| {
            let current = state.session();
            let retired = state.has_retired(session.id);
            let same_principal = current.map(|s| s.principal_id) == Some(session.principal_id);
            if current.map(|s| s.id) == Some(session.id) || (retired && same_principal) {
                // Ours, or a refresh of ours: wait for its hydration.
                !state.hydration().is_pending()
            } else {
                retired
            }
        });

        let outcome = tokio::time::timeout(self.config.hydration_timeout(), settled).await;
        match outcome {
            Ok(Ok(state)) if state.principal_id() == Some(session.principal_id) => {
                match state.hydration() {
                    HydrationStatus::Failed(e) => Err(e.clone()),
                    _ => Ok(()),
                }
            }
            Ok(Ok(_)) => {
                debug!(session_id = %session.id, "session replaced before hydration settled");
                Err(AuthError::NotAuthenticated)
            }
            Ok(Err(_)) => Err(AuthError::remote("session state channel closed")),
            Err(_) => Err(AuthError::remote("timed out waiting for profile hydration")),
        }
    }

    /// Sign out. Local state is cleared before the remote call, so a store
    /// outage can never leave a stale profile or role set visible.
    pub async fn sign_out(&self) -> SignOutReport {
        let principal_id = self.state.borrow().principal_id();
        self.state.send_modify(|state| {
            state.clear();
        });

        let warning = match self.credentials.sign_out().await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "remote sign-out failed; local session cleared");
                Some(e)
            }
        };

        if let Some(principal_id) = principal_id {
            info!(%principal_id, "signed out");
        }
        SignOutReport { warning }
    }

    /// Reload profile and roles for the current session (no-op when signed out).
    pub async fn refresh_profile(&self) -> AuthResult<()> {
        // Read and re-adopt in one update so a concurrent sign-out cannot be undone.
        let mut target = None;
        self.state.send_if_modified(|state| {
            let Some(session) = state.session().cloned() else {
                return false;
            };
            target = state.begin_hydration(session.clone()).map(|epoch| (epoch, session));
            target.is_some()
        });
        let Some((epoch, session)) = target else {
            return Ok(());
        };
        let session_id = session.id;
        self.hydrate(epoch, session).await;

        let state = self.state.borrow();
        let still_current = state.session().map(|s| s.id) == Some(session_id);
        match state.hydration() {
            HydrationStatus::Failed(e) if still_current => Err(e.clone()),
            _ => Ok(()),
        }
    }

    /// Replace the signed-in principal's secret and clear the
    /// "must change password" flag.
    pub async fn change_password(&self, new_secret: &str) -> AuthResult<()> {
        let principal_id = self
            .state
            .borrow()
            .principal_id()
            .ok_or(AuthError::NotAuthenticated)?;

        if new_secret.chars().count() < self.config.min_password_length {
            return Err(AuthError::validation(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        self.credentials
            .update_secret(principal_id, new_secret)
            .await?;
        self.profiles.mark_password_changed(principal_id).await?;
        info!(%principal_id, "password changed");

        self.refresh_profile().await
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}
