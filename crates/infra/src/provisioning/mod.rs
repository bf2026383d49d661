//! Member provisioning: account + profile + role assignment.
//!
//! The three remote writes have no shared transaction. Each completed write
//! records its compensation in a [`CompensationLog`]; a later failure unwinds
//! the log unless `compensate_failed_provisioning` is off, in which case the
//! partial records are left in place and reported as orphaned.

pub mod admin;
pub mod saga;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use chama_auth::{
    AccessGuard, AuthError, LoginHandle, NewProfile, RoleName, TemporarySecret,
};
use chama_core::{PhoneNumber, PrincipalId};

use crate::config::AuthConfig;
use crate::session::AuthState;
use crate::store::{AccountMetadata, CredentialStore, NewAccount, ProfileStore};

pub use admin::RoleAdministration;
pub use saga::{Compensation, CompensationLog, UnwindReport};

/// Operator input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionMember {
    pub full_name: String,
    pub phone_number: String,
    pub role: String,
}

/// Handed back once for display; the secret is not stored anywhere else.
#[derive(Debug, Clone)]
pub struct ProvisionedMember {
    pub principal_id: PrincipalId,
    pub full_name: String,
    pub phone_number: PhoneNumber,
    pub role: RoleName,
    pub temporary_secret: TemporarySecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStep {
    Authorize,
    Validate,
    CreateAccount,
    InsertProfile,
    ResolveRole,
    AssignRole,
}

impl core::fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ProvisioningStep::Authorize => "authorize",
            ProvisioningStep::Validate => "validate",
            ProvisioningStep::CreateAccount => "create_account",
            ProvisioningStep::InsertProfile => "insert_profile",
            ProvisioningStep::ResolveRole => "resolve_role",
            ProvisioningStep::AssignRole => "assign_role",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provisioning failed at {step}: {source}")]
pub struct ProvisioningError {
    pub step: ProvisioningStep,
    pub source: AuthError,
    /// Compensations that ran successfully.
    pub compensated: Vec<Compensation>,
    /// Records left behind by this run.
    pub orphaned: Vec<Compensation>,
}

impl ProvisioningError {
    fn before_any_write(step: ProvisioningStep, source: AuthError) -> Self {
        Self {
            step,
            source,
            compensated: Vec::new(),
            orphaned: Vec::new(),
        }
    }

    pub fn kind(&self) -> &AuthError {
        &self.source
    }

    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty()
    }
}

impl From<ProvisioningError> for AuthError {
    fn from(value: ProvisioningError) -> Self {
        value.source
    }
}

pub struct MemberProvisioning {
    credentials: Arc<dyn CredentialStore>,
    profiles: Arc<dyn ProfileStore>,
    config: AuthConfig,
}

impl MemberProvisioning {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        profiles: Arc<dyn ProfileStore>,
        config: AuthConfig,
    ) -> Self {
        Self {
            credentials,
            profiles,
            config,
        }
    }

    /// Guard that must pass before [`provision`](Self::provision) is reachable.
    pub fn administrator_guard(&self) -> AccessGuard {
        AccessGuard::new().require_role(self.config.administrator_role.clone())
    }

    /// Run the workflow on behalf of `actor`, gated by the administrator guard.
    pub async fn provision_as(
        &self,
        actor: &AuthState,
        request: ProvisionMember,
    ) -> Result<ProvisionedMember, ProvisioningError> {
        if !actor.is_authenticated() {
            return Err(ProvisioningError::before_any_write(
                ProvisioningStep::Authorize,
                AuthError::NotAuthenticated,
            ));
        }
        if let Err(denied) = self.administrator_guard().check(actor.roles()) {
            warn!(actor = ?actor.principal_id(), "provisioning denied");
            return Err(ProvisioningError::before_any_write(
                ProvisioningStep::Authorize,
                denied,
            ));
        }
        self.provision(request).await
    }

    /// Run the workflow. Authorization is the caller's job.
    #[instrument(skip(self, request), fields(role = %request.role))]
    pub async fn provision(
        &self,
        request: ProvisionMember,
    ) -> Result<ProvisionedMember, ProvisioningError> {
        let (full_name, phone_number, role) = validate(request)
            .map_err(|e| ProvisioningError::before_any_write(ProvisioningStep::Validate, e))?;

        let temporary_secret = TemporarySecret::generate();
        let handle = LoginHandle::derive(&phone_number, &self.config.login_domain);

        let mut log = CompensationLog::new();

        let principal_id = match self
            .credentials
            .create_account(NewAccount {
                handle: handle.clone(),
                secret: temporary_secret.expose(),
                confirmed: true,
                metadata: AccountMetadata {
                    phone_number: phone_number.clone(),
                    full_name: full_name.clone(),
                },
            })
            .await
        {
            Ok(id) => id,
            Err(e) => return Err(self.fail(ProvisioningStep::CreateAccount, e, log).await),
        };
        log.record(Compensation::DeleteAccount(principal_id));
        info!(%principal_id, %handle, "account created");

        let profile = NewProfile {
            id: principal_id,
            phone_number: phone_number.clone(),
            full_name: full_name.clone(),
        };
        if let Err(e) = self.profiles.insert_profile(profile).await {
            return Err(self.fail(ProvisioningStep::InsertProfile, e, log).await);
        }
        log.record(Compensation::DeleteProfile(principal_id));

        let role_id = match self.profiles.get_role_id_by_name(role.as_str()).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                let e = AuthError::RoleNotFound(role.to_string());
                return Err(self.fail(ProvisioningStep::ResolveRole, e, log).await);
            }
            Err(e) => return Err(self.fail(ProvisioningStep::ResolveRole, e, log).await),
        };

        if let Err(e) = self
            .profiles
            .insert_role_assignment(principal_id, role_id)
            .await
        {
            return Err(self.fail(ProvisioningStep::AssignRole, e, log).await);
        }

        info!(%principal_id, %role, "member provisioned");
        Ok(ProvisionedMember {
            principal_id,
            full_name,
            phone_number,
            role,
            temporary_secret,
        })
    }

    async fn fail(
        &self,
        step: ProvisioningStep,
        source: AuthError,
        log: CompensationLog,
    ) -> ProvisioningError {
        warn!(%step, error = %source, "provisioning step failed");
        let report = if log.is_empty() {
            UnwindReport::default()
        } else if self.config.compensate_failed_provisioning {
            log.unwind(self.credentials.as_ref(), self.profiles.as_ref())
                .await
        } else {
            let report = log.abandon();
            warn!(orphaned = ?report.orphaned, "compensation disabled; partial records kept");
            report
        };
        ProvisioningError {
            step,
            source,
            compensated: report.compensated,
            orphaned: report.orphaned,
        }
    }
}

fn validate(request: ProvisionMember) -> Result<(String, PhoneNumber, RoleName), AuthError> {
    let full_name = request.full_name.trim();
    if full_name.is_empty() {
        return Err(AuthError::validation("full name must not be empty"));
    }
    let phone_number = PhoneNumber::parse(&request.phone_number)?;
    let role = request.role.trim();
    if role.is_empty() {
        return Err(AuthError::validation("role must not be empty"));
    }
    Ok((
        full_name.to_string(),
        phone_number,
        RoleName::from(role.to_string()),
    ))
}
