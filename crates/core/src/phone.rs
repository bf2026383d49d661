//! Phone number value object (the principal's login handle).

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Minimum number of digits accepted for a phone number.
pub const MIN_PHONE_DIGITS: usize = 10;

/// A validated phone number.
///
/// Whitespace is stripped; the remaining text must be ASCII digits with an
/// optional leading `+`. No country-code rewriting happens here: the stored
/// profile and the derived provider handle must agree byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let digits = compact.strip_prefix('+').unwrap_or(&compact);

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation(
                "phone number must contain only digits and an optional leading '+'",
            ));
        }
        if digits.len() < MIN_PHONE_DIGITS {
            return Err(DomainError::validation(format!(
                "phone number must have at least {MIN_PHONE_DIGITS} digits"
            )));
        }

        Ok(Self(compact))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for PhoneNumber {}

impl core::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl core::str::FromStr for PhoneNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
