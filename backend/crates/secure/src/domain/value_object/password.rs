//! Password Value Objects
//!
//! Domain wrappers around `platform::password`: [`Password`] is the clear
//! text candidate (zeroized on drop), [`PasswordHash`] the stored bcrypt
//! string.

use std::fmt;

use platform::password::{ClearTextPassword, HashedPassword, PasswordHashError, PasswordPolicyError};

/// Clear text password from user input
pub struct Password(ClearTextPassword);

impl Password {
    /// Create a password that satisfies the creation policy
    ///
    /// At least 8 characters with one lowercase and one uppercase letter;
    /// empty or whitespace-only input is rejected.
    pub fn new(raw: impl Into<String>) -> Result<Self, PasswordPolicyError> {
        ClearTextPassword::new(raw).map(Self)
    }

    /// Check a candidate password without keeping it
    pub fn validate(raw: &str) -> Result<(), PasswordPolicyError> {
        Self::new(raw).map(drop)
    }

    /// Reject a password that would not fit bcrypt's input with `pepper`
    pub fn fits_pepper(&self, pepper: Option<&[u8]>) -> Result<(), PasswordPolicyError> {
        self.0.fits_pepper(pepper)
    }

    /// Hash at the given bcrypt cost, appending the pepper if any
    ///
    /// CPU-bound; run on a blocking thread.
    pub fn hash(&self, cost: u32, pepper: Option<&[u8]>) -> Result<PasswordHash, PasswordHashError> {
        self.0.hash(cost, pepper).map(PasswordHash)
    }

    pub(crate) fn inner(&self) -> &ClearTextPassword {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Password").field(&"[REDACTED]").finish()
    }
}

/// bcrypt hash as stored in `accounts.password_hash`
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(HashedPassword);

impl PasswordHash {
    pub fn from_hash_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        HashedPassword::from_hash_string(s).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Constant-time comparison; CPU-bound
    pub fn verify(&self, password: &Password, pepper: Option<&[u8]>) -> Result<bool, PasswordHashError> {
        self.0.verify(password.inner(), pepper)
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[HASH]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::password::MIN_COST;

    #[test]
    fn test_policy() {
        assert!(Password::validate("Correct_1").is_ok());
        assert_eq!(
            Password::validate("lowercase1"),
            Err(PasswordPolicyError::MissingUppercase)
        );
        assert_eq!(
            Password::validate("UPPERCASE1"),
            Err(PasswordPolicyError::MissingLowercase)
        );
        assert_eq!(
            Password::validate("   "),
            Err(PasswordPolicyError::EmptyOrWhitespace)
        );
    }

    #[test]
    fn test_hash_round_trip() {
        let password = Password::new("Correct_1").unwrap();
        let hash = password.hash(MIN_COST, Some(b"salt")).unwrap();
        assert_eq!(hash.as_str().len(), 60);

        let stored = PasswordHash::from_hash_string(hash.as_str()).unwrap();
        assert_eq!(stored, hash);
        assert!(stored.verify(&password, Some(b"salt")).unwrap());

        let wrong = Password::new("Wrong_111").unwrap();
        assert!(!stored.verify(&wrong, Some(b"salt")).unwrap());
    }

    #[test]
    fn test_debug_redaction() {
        let password = Password::new("Secret_pass1").unwrap();
        assert!(!format!("{password:?}").contains("Secret"));
    }
}
