//! Account Entity

use crate::domain::value_object::{AccountState, Login, PasswordHash, UserId};

/// Login data of an account, as stored in `accounts`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub login: Login,
    pub user_id: UserId,
    pub password_hash: PasswordHash,
    pub state: AccountState,
}

impl Account {
    pub fn id_and_hash(&self) -> IdAndHash {
        IdAndHash {
            user_id: self.user_id,
            password_hash: self.password_hash.clone(),
        }
    }
}

/// Cached `uh:<login>` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAndHash {
    pub user_id: UserId,
    pub password_hash: PasswordHash,
}
