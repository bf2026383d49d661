//! Infrastructure layer: store contracts, session lifecycle, provisioning.

pub mod config;
pub mod provisioning;
pub mod session;
pub mod store;

pub use config::{AuthConfig, ConfigError};
pub use provisioning::{
    MemberProvisioning, ProvisionMember, ProvisionedMember, ProvisioningError, ProvisioningStep,
    RoleAdministration,
};
pub use session::{AuthState, HydrationStatus, ProfileLoader, SessionManager, SignOutReport};
pub use store::{CredentialStore, ProfileStore, SessionSubscription};
