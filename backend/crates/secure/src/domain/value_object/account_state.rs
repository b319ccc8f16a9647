//! Account State Value Object
//!
//! Stored as a small integer both in `accounts.state` and in the
//! `as:<login>` cache entry. Only [`AccountState::Enabled`] accounts may log in.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid account state {0}")]
pub struct InvalidAccountState(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
#[repr(i16)]
pub enum AccountState {
    #[default]
    Enabled = 1,
    Disabled = 2,
}

impl AccountState {
    pub const ALL: [AccountState; 2] = [AccountState::Enabled, AccountState::Disabled];

    /// Numeric ID for storage
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    /// True if `value` is a defined state
    #[inline]
    pub fn is_correct(value: i64) -> bool {
        Self::from_id(value).is_some()
    }

    #[inline]
    pub fn from_id(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Enabled),
            2 => Some(Self::Disabled),
            _ => None,
        }
    }

    #[inline]
    pub const fn can_login(&self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl fmt::Display for AccountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("enabled"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

impl TryFrom<i64> for AccountState {
    type Error = InvalidAccountState;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_id(value).ok_or(InvalidAccountState(value))
    }
}

impl From<AccountState> for i64 {
    fn from(state: AccountState) -> Self {
        state.id().into()
    }
}
