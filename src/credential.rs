//! The single shared PIN that gates the whole application.
//!
//! The same value is checked by the server on every protected request and,
//! when configured locally, by the client gate before it persists a token.
//! Comparison is a plain string equality: no trimming, no case folding.

use secrecy::{ExposeSecret, SecretString};

/// Number of digits a PIN must have.
pub const PIN_DIGITS: usize = 4;

/// Returns true when `value` is exactly [`PIN_DIGITS`] ASCII digits.
#[must_use]
pub fn is_pin_format(value: &str) -> bool {
    value.len() == PIN_DIGITS && value.bytes().all(|byte| byte.is_ascii_digit())
}

/// Holds the accepted secret. Immutable once built.
#[derive(Clone, Debug)]
pub struct Credential {
    secret: SecretString,
}

impl Credential {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Exact comparison against the configured secret.
    #[must_use]
    pub fn is_valid(&self, candidate: &str) -> bool {
        self.secret.expose_secret() == candidate
    }

    pub(crate) fn secret(&self) -> &SecretString {
        &self.secret
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(SecretString::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_exact_secret() {
        let credential = Credential::from("4079");
        assert!(credential.is_valid("4079"));
        assert!(!credential.is_valid("0000"));
        assert!(!credential.is_valid("407"));
        assert!(!credential.is_valid("40790"));
        assert!(!credential.is_valid(" 4079"));
        assert!(!credential.is_valid("4079 "));
        assert!(!credential.is_valid(""));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let credential = Credential::from("AbCd");
        assert!(credential.is_valid("AbCd"));
        assert!(!credential.is_valid("abcd"));
        assert!(!credential.is_valid("ABCD"));
    }

    #[test]
    fn debug_output_does_not_leak_the_secret() {
        let credential = Credential::from("4079");
        let debug = format!("{credential:?}");
        assert!(!debug.contains("4079"));
    }

    #[test]
    fn pin_format_requires_four_ascii_digits() {
        assert!(is_pin_format("4079"));
        assert!(is_pin_format("0000"));
        assert!(!is_pin_format("407"));
        assert!(!is_pin_format("40790"));
        assert!(!is_pin_format("40a9"));
        assert!(!is_pin_format("٤٠٧٩"));
        assert!(!is_pin_format(""));
    }
}
