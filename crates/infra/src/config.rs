//! Configuration of the identity layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid auth config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid auth config: {0}")]
    Invalid(String),
}

/// Tunables for sign-in, hydration and provisioning.
///
/// Connection endpoints belong to the store implementations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Domain appended to the phone number to form the provider login handle.
    pub login_domain: String,

    /// How long `sign_in` waits for the reactive hydration to settle.
    pub hydration_timeout_ms: u64,

    /// Role required in front of provisioning and role administration.
    pub administrator_role: String,

    /// Undo earlier provisioning steps when a later one fails.
    pub compensate_failed_provisioning: bool,

    /// Minimum length accepted by `change_password`.
    pub min_password_length: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            login_domain: "savingsgroup.local".to_string(),
            hydration_timeout_ms: 10_000,
            administrator_role: "chairman".to_string(),
            compensate_failed_provisioning: true,
            min_password_length: 6,
        }
    }
}

impl AuthConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.login_domain.trim().is_empty() || self.login_domain.contains('@') {
            return Err(ConfigError::Invalid(
                "login_domain must be a non-empty domain without '@'".to_string(),
            ));
        }
        if self.hydration_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "hydration_timeout_ms must be positive".to_string(),
            ));
        }
        if self.administrator_role.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "administrator_role cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn hydration_timeout(&self) -> Duration {
        Duration::from_millis(self.hydration_timeout_ms)
    }
}
