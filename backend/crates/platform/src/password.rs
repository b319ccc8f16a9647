//! Password Policy, Hashing and Verification
//!
//! - bcrypt hashing with a configurable cost
//! - Optional application-wide pepper appended before hashing; password
//!   and pepper together must fit the 72 bytes bcrypt reads
//! - Zeroization of clear text on drop
//! - Constant-time verification (delegated to bcrypt)
//!
//! bcrypt is CPU-bound; async callers should run [`ClearTextPassword::hash`]
//! and [`HashedPassword::verify`] on a blocking thread.

use std::fmt;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

/// Minimum password length (in characters)
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt only reads the first 72 bytes of its input
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Length of a bcrypt modular-crypt string (`$2b$cc$` + 53 chars)
pub const BCRYPT_HASH_LENGTH: usize = 60;

/// Lowest and highest cost accepted by bcrypt
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// Cost used when none is configured
pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

// ============================================================================
// Error Types
// ============================================================================

/// Password policy violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordPolicyError {
    #[error("password must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },

    #[error("password must be at most {max} bytes (got {actual})")]
    TooLong { max: usize, actual: usize },

    #[error("password cannot be empty or contain only whitespace")]
    EmptyOrWhitespace,

    #[error("password must contain a lowercase character")]
    MissingLowercase,

    #[error("password must contain an uppercase character")]
    MissingUppercase,

    #[error("password contains invalid control characters")]
    InvalidCharacter,
}

/// Password hashing/verification errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("password hashing failed: {0}")]
    HashingFailed(#[from] bcrypt::BcryptError),

    #[error("invalid password hash format")]
    InvalidHashFormat,

    #[error("bcrypt cost {0} is out of range")]
    InvalidCost(u32),

    #[error("password and pepper exceed {max} bytes (got {actual})")]
    PepperedTooLong { max: usize, actual: usize },
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Does not implement `Clone`; debug output is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Create a new clear text password with validation
    ///
    /// Rules:
    /// - at least [`MIN_PASSWORD_LENGTH`] characters
    /// - at most [`MAX_PASSWORD_BYTES`] bytes
    /// - at least one lowercase and one uppercase character
    /// - no control characters, not whitespace only
    ///
    /// Unicode is normalized using NFKC before validation.
    pub fn new(raw: impl Into<String>) -> Result<Self, PasswordPolicyError> {
        let mut raw = raw.into();
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();

        let password = Self(normalized);
        password.check_policy()?;
        Ok(password)
    }

    /// Check that the password still fits bcrypt's input once `pepper` is appended
    pub fn fits_pepper(&self, pepper: Option<&[u8]>) -> Result<(), PasswordPolicyError> {
        let max = MAX_PASSWORD_BYTES.saturating_sub(pepper.map_or(0, <[u8]>::len));
        if self.0.len() > max {
            return Err(PasswordPolicyError::TooLong {
                max,
                actual: self.0.len(),
            });
        }
        Ok(())
    }

    fn check_policy(&self) -> Result<(), PasswordPolicyError> {
        let value = self.0.as_str();

        if value.trim().is_empty() {
            return Err(PasswordPolicyError::EmptyOrWhitespace);
        }

        let char_count = value.chars().count();
        if char_count < MIN_PASSWORD_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: MIN_PASSWORD_LENGTH,
                actual: char_count,
            });
        }

        if value.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordPolicyError::TooLong {
                max: MAX_PASSWORD_BYTES,
                actual: value.len(),
            });
        }

        if value
            .chars()
            .any(|ch| ch.is_control() && ch != '\t' && ch != '\n')
        {
            return Err(PasswordPolicyError::InvalidCharacter);
        }

        if !value.chars().any(char::is_lowercase) {
            return Err(PasswordPolicyError::MissingLowercase);
        }
        if !value.chars().any(char::is_uppercase) {
            return Err(PasswordPolicyError::MissingUppercase);
        }

        Ok(())
    }

    /// Password followed by the pepper, refused past what bcrypt reads
    fn peppered(&self, pepper: Option<&[u8]>) -> Result<Vec<u8>, PasswordHashError> {
        let actual = self.0.len() + pepper.map_or(0, <[u8]>::len);
        if actual > MAX_PASSWORD_BYTES {
            return Err(PasswordHashError::PepperedTooLong {
                max: MAX_PASSWORD_BYTES,
                actual,
            });
        }
        let mut bytes = self.0.as_bytes().to_vec();
        if let Some(p) = pepper {
            bytes.extend_from_slice(p);
        }
        Ok(bytes)
    }

    /// Hash the password with bcrypt at the given cost
    pub fn hash(&self, cost: u32, pepper: Option<&[u8]>) -> Result<HashedPassword, PasswordHashError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(PasswordHashError::InvalidCost(cost));
        }
        let mut bytes = self.peppered(pepper)?;
        let hash = bcrypt::hash(&bytes, cost);
        bytes.zeroize();
        Ok(HashedPassword { hash: hash? })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// bcrypt hash in modular-crypt format (`$2b$<cost>$<salt+hash>`)
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from a stored hash string, checking its shape
    pub fn from_hash_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        if hash.len() != BCRYPT_HASH_LENGTH || !hash.starts_with("$2") {
            return Err(PasswordHashError::InvalidHashFormat);
        }
        Ok(Self { hash })
    }

    /// Get the hash string for storage
    pub fn as_str(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash (constant time)
    ///
    /// A candidate too long to have been hashed with `pepper` never matches.
    pub fn verify(
        &self,
        password: &ClearTextPassword,
        pepper: Option<&[u8]>,
    ) -> Result<bool, PasswordHashError> {
        let mut bytes = match password.peppered(pepper) {
            Ok(bytes) => bytes,
            Err(PasswordHashError::PepperedTooLong { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let matched = bcrypt::verify(&bytes, &self.hash);
        bytes.zeroize();
        Ok(matched?)
    }

    /// Cost parameter encoded in the hash
    pub fn cost(&self) -> Option<u32> {
        self.hash.get(4..6)?.parse().ok()
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}
