use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chama_core::{Entity, PhoneNumber, PrincipalId};

/// Profile row of a registered principal.
///
/// Principals are never deleted; deactivation flips `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PrincipalId,
    pub phone_number: PhoneNumber,
    pub full_name: String,
    pub is_active: bool,
    pub must_change_password: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl Entity for Profile {
    type Id = PrincipalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Insert payload for a freshly provisioned principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: PrincipalId,
    pub phone_number: PhoneNumber,
    pub full_name: String,
}

impl NewProfile {
    /// Active, with a pending password change and no login yet.
    pub fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            phone_number: self.phone_number,
            full_name: self.full_name,
            is_active: true,
            must_change_password: true,
            last_login: None,
        }
    }
}
