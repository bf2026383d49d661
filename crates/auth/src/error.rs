use serde::Serialize;
use thiserror::Error;

use chama_core::{DomainError, PrincipalId};

pub type AuthResult<T> = Result<T, AuthError>;

/// Failure taxonomy of the identity layer.
///
/// Kinds are preserved end to end; presentation is left to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AuthError {
    #[error("invalid phone number or password")]
    InvalidCredentials,

    /// The principal exists but has been deactivated.
    #[error("account suspended, contact the chairman")]
    AccountSuspended,

    /// The credential store knows the principal but the profile table does not.
    #[error("no profile found for principal {0}")]
    ProfileNotFound(PrincipalId),

    #[error("role '{0}' not found")]
    RoleNotFound(String),

    #[error("handle '{0}' is already registered")]
    DuplicateHandle(String),

    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("forbidden: requires {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("session manager has not been initialized")]
    NotInitialized,
}

impl AuthError {
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteUnavailable(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::Conflict(msg) => Self::DuplicateHandle(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suspended_and_invalid_credentials_read_differently() {
        assert_ne!(
            AuthError::InvalidCredentials.to_string(),
            AuthError::AccountSuspended.to_string()
        );
    }

    #[test]
    fn domain_validation_maps_to_validation() {
        let err: AuthError = DomainError::validation("bad phone").into();
        assert_eq!(err, AuthError::Validation("bad phone".to_string()));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(AuthError::RoleNotFound("auditor".into())).unwrap();
        assert_eq!(json["kind"], "role_not_found");
        assert_eq!(json["detail"], "auditor");
    }
}
