//! Session Token Value Object
//!
//! Opaque bearer secret. Debug output is redacted and there is no
//! `Display`, so a token cannot end up in a log line by accident.

use std::fmt;

use thiserror::Error;

/// Shortest token the service issues or accepts
pub const SESSION_TOKEN_MIN_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionTokenError {
    #[error("token is too short")]
    TooShort,

    #[error("token contains characters outside the URL-safe alphabet")]
    InvalidCharacter,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Result<Self, SessionTokenError> {
        let raw = raw.into();
        if raw.len() < SESSION_TOKEN_MIN_LENGTH {
            return Err(SessionTokenError::TooShort);
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(SessionTokenError::InvalidCharacter);
        }
        Ok(Self(raw))
    }

    /// Fresh random token of exactly `length` characters
    pub fn generate(length: usize) -> Self {
        Self(platform::crypto::random_token(length))
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionToken").field(&"[REDACTED]").finish()
    }
}
