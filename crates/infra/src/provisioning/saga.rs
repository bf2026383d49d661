//! Compensation bookkeeping for multi-step provisioning.
//!
//! The stores offer no transaction spanning the credential store and the
//! profile tables. Every completed step registers the action that undoes it;
//! on failure the log is unwound in reverse order.

use serde::Serialize;
use tracing::{error, info};

use chama_auth::AuthResult;
use chama_core::PrincipalId;

use crate::store::{CredentialStore, ProfileStore};

/// An action that undoes one completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "principal_id", rename_all = "snake_case")]
pub enum Compensation {
    /// Remove the credential-store account.
    DeleteAccount(PrincipalId),
    /// Remove the profile row (and any assignment pointing at it).
    DeleteProfile(PrincipalId),
}

impl Compensation {
    async fn run(
        self,
        credentials: &dyn CredentialStore,
        profiles: &dyn ProfileStore,
    ) -> AuthResult<()> {
        match self {
            Compensation::DeleteAccount(id) => credentials.delete_account(id).await,
            Compensation::DeleteProfile(id) => profiles.delete_profile(id).await,
        }
    }
}

/// What unwinding achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnwindReport {
    pub compensated: Vec<Compensation>,
    /// Compensations that failed or were skipped; the records they name are orphaned.
    pub orphaned: Vec<Compensation>,
}

#[derive(Debug, Default)]
pub struct CompensationLog {
    pending: Vec<Compensation>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, compensation: Compensation) {
        self.pending.push(compensation);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run every compensation, newest first. A failing compensation does not
    /// stop the others.
    pub async fn unwind(
        self,
        credentials: &dyn CredentialStore,
        profiles: &dyn ProfileStore,
    ) -> UnwindReport {
        let mut report = UnwindReport::default();
        for compensation in self.pending.into_iter().rev() {
            match compensation.run(credentials, profiles).await {
                Ok(()) => {
                    info!(?compensation, "compensation applied");
                    report.compensated.push(compensation);
                }
                Err(e) => {
                    error!(?compensation, error = %e, "compensation failed; record left orphaned");
                    report.orphaned.push(compensation);
                }
            }
        }
        report
    }

    /// Leave everything in place and report it as orphaned.
    pub fn abandon(self) -> UnwindReport {
        UnwindReport {
            compensated: Vec::new(),
            orphaned: self.pending.into_iter().rev().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::in_memory::CredentialOp;
    use crate::store::{
        AccountMetadata, InMemoryCredentialStore, InMemoryProfileStore, NewAccount,
    };
    use chama_auth::{AuthError, LoginHandle, NewProfile};
    use chama_core::PhoneNumber;

    async fn seeded() -> (InMemoryCredentialStore, InMemoryProfileStore, PrincipalId) {
        let credentials = InMemoryCredentialStore::new();
        let profiles = InMemoryProfileStore::new();
        let phone = PhoneNumber::parse("0712345678").unwrap();
        let id = credentials
            .create_account(NewAccount {
                handle: LoginHandle::derive(&phone, "savingsgroup.local"),
                secret: "123456",
                confirmed: true,
                metadata: AccountMetadata {
                    phone_number: phone.clone(),
                    full_name: "Mwangi".to_string(),
                },
            })
            .await
            .unwrap();
        profiles
            .insert_profile(NewProfile {
                id,
                phone_number: phone,
                full_name: "Mwangi".to_string(),
            })
            .await
            .unwrap();
        (credentials, profiles, id)
    }

    #[tokio::test]
    async fn unwind_runs_newest_first() {
        let (credentials, profiles, id) = seeded().await;
        let mut log = CompensationLog::new();
        log.record(Compensation::DeleteAccount(id));
        log.record(Compensation::DeleteProfile(id));

        let report = log.unwind(&credentials, &profiles).await;
        assert_eq!(
            report.compensated,
            vec![Compensation::DeleteProfile(id), Compensation::DeleteAccount(id)]
        );
        assert!(report.orphaned.is_empty());
        assert_eq!(credentials.account_count(), 0);
        assert_eq!(profiles.profile_count(), 0);
    }

    #[tokio::test]
    async fn failed_compensation_is_reported_and_others_still_run() {
        let (credentials, profiles, id) = seeded().await;
        credentials
            .faults()
            .fail(CredentialOp::DeleteAccount, AuthError::remote("down"));

        let mut log = CompensationLog::new();
        log.record(Compensation::DeleteAccount(id));
        log.record(Compensation::DeleteProfile(id));

        let report = log.unwind(&credentials, &profiles).await;
        assert_eq!(report.compensated, vec![Compensation::DeleteProfile(id)]);
        assert_eq!(report.orphaned, vec![Compensation::DeleteAccount(id)]);
        assert_eq!(credentials.account_count(), 1);
    }

    #[test]
    fn abandon_reports_everything_orphaned() {
        let id = PrincipalId::new();
        let mut log = CompensationLog::new();
        log.record(Compensation::DeleteAccount(id));
        let report = log.abandon();
        assert!(report.compensated.is_empty());
        assert_eq!(report.orphaned, vec![Compensation::DeleteAccount(id)]);
    }
}
