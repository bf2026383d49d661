use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chama_core::{PrincipalId, SessionId};

use crate::credentials::LoginHandle;

/// Proof of authentication issued by the credential store.
///
/// The store owns the session; the identity layer only caches this reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub principal_id: PrincipalId,
    pub handle: LoginHandle,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionValidationError {
    #[error("session has expired")]
    Expired,

    #[error("session not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid session time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

impl Session {
    /// Deterministically check the session's validity window at `now`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), SessionValidationError> {
        if self.expires_at <= self.issued_at {
            return Err(SessionValidationError::InvalidTimeWindow);
        }
        if now < self.issued_at {
            return Err(SessionValidationError::NotYetValid);
        }
        if now >= self.expires_at {
            return Err(SessionValidationError::Expired);
        }
        Ok(())
    }
}

/// Why the credential store emitted a session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SignedIn,
    TokenRefreshed,
    UserUpdated,
    SignedOut,
    Expired,
}

/// Session-change notification delivered by the credential store.
///
/// `session` is the new current session; `None` means signed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

impl SessionEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: SessionEventKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn refreshed(session: Session) -> Self {
        Self {
            kind: SessionEventKind::TokenRefreshed,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: SessionEventKind::SignedOut,
            session: None,
        }
    }

    pub fn expired() -> Self {
        Self {
            kind: SessionEventKind::Expired,
            session: None,
        }
    }
}
