//! Login Value Object
//!
//! The unique, human-facing account handle. Only the length is constrained;
//! the handle is stored and compared exactly as given.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum login length (in characters)
pub const LOGIN_MIN_LENGTH: usize = 3;

/// Maximum login length (in characters)
pub const LOGIN_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("invalid login length")]
    InvalidLength,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Login(String);

impl Login {
    pub fn new(raw: impl Into<String>) -> Result<Self, LoginError> {
        let raw = raw.into();
        Self::validate(&raw)?;
        Ok(Self(raw))
    }

    /// Check a candidate login without taking ownership
    pub fn validate(raw: &str) -> Result<(), LoginError> {
        let length = raw.chars().count();
        if (LOGIN_MIN_LENGTH..=LOGIN_MAX_LENGTH).contains(&length) {
            Ok(())
        } else {
            Err(LoginError::InvalidLength)
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Login {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Login {
    type Error = LoginError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Login> for String {
    fn from(login: Login) -> Self {
        login.0
    }
}
