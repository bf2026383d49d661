//! `chama-auth`: pure identity and access model (no I/O).
//!
//! Remote collaborators (credential store, profile tables) and the stateful
//! session lifecycle live in `chama-infra`; everything here is deterministic
//! apart from temporary secret generation.

pub mod authorize;
pub mod catalogue;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod session;

pub use authorize::{
    AuthorizationExplanation, DenialKind, DenialReason, explain_authorization, has_permission,
    has_role,
};
pub use catalogue::default_roles;
pub use credentials::{LoginHandle, TemporarySecret};
pub use error::{AuthError, AuthResult};
pub use guard::{AccessGuard, is_allowed};
pub use permissions::{PermissionKey, PermissionMap};
pub use principal::{NewProfile, Profile};
pub use roles::{AssignedRole, Role, RoleAssignment, RoleName};
pub use session::{Session, SessionEvent, SessionEventKind, SessionValidationError};
