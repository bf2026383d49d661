//! Login handle derivation and temporary secret generation.

use rand::Rng;
use serde::{Deserialize, Serialize};

use chama_core::{PhoneNumber, ValueObject};

/// Smallest temporary secret (inclusive).
pub const TEMPORARY_SECRET_MIN: u32 = 100_000;
/// Largest temporary secret (inclusive).
pub const TEMPORARY_SECRET_MAX: u32 = 999_999;

/// Provider-side login identifier.
///
/// The credential store only knows email-shaped handles, so the phone number
/// is mapped to `"{phone}@{domain}"`. Sign-in and provisioning both go
/// through [`LoginHandle::derive`] so the two never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoginHandle(String);

impl LoginHandle {
    pub fn derive(phone: &PhoneNumber, domain: &str) -> Self {
        Self(format!("{}@{}", phone.as_str(), domain))
    }

    /// Wrap a handle reported back by the credential store.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for LoginHandle {}

impl core::fmt::Display for LoginHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A one-time, 6-digit numeric password handed to the operator.
///
/// `Debug` is redacted; the plaintext is reachable only through
/// [`expose`](Self::expose).
#[derive(Clone, PartialEq, Eq)]
pub struct TemporarySecret(String);

impl TemporarySecret {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let value = rng.gen_range(TEMPORARY_SECRET_MIN..=TEMPORARY_SECRET_MAX);
        Self(value.to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for TemporarySecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("TemporarySecret(******)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn handle_uses_phone_and_domain() {
        let phone = PhoneNumber::parse("0712345678").unwrap();
        let handle = LoginHandle::derive(&phone, "savingsgroup.local");
        assert_eq!(handle.as_str(), "0712345678@savingsgroup.local");
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let secret = TemporarySecret::generate();
        assert!(!format!("{secret:?}").contains(secret.expose()));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 512,
            ..ProptestConfig::default()
        })]

        /// Property: every generated secret is exactly six digits within range.
        #[test]
        fn temporary_secret_is_six_digits_in_range(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            let secret = TemporarySecret::generate_with(&mut rng);
            let text = secret.expose();

            prop_assert_eq!(text.len(), 6);
            prop_assert!(text.chars().all(|c| c.is_ascii_digit()));
            let value: u32 = text.parse().unwrap();
            prop_assert!((TEMPORARY_SECRET_MIN..=TEMPORARY_SECRET_MAX).contains(&value));
        }
    }
}
