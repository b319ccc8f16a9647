//! Create Account Use Case
//!
//! Registers an enabled account and warms its cache entries.

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;

use crate::application::config::SecureConfig;
use crate::application::password::hash_password;
use crate::domain::entity::Account;
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::{AccountState, Login, Password, UserId};
use crate::error::{SecureResult, invalid_argument};
use crate::infra::joint::JointRepository;

/// Create account input
pub struct CreateAccountInput {
    pub login: String,
    pub password: String,
    /// Generated (v4) when absent
    pub user_id: Option<UserId>,
}

pub struct CreateAccountUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
    config: Arc<SecureConfig>,
}

impl<P, M> CreateAccountUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>, config: Arc<SecureConfig>) -> Self {
        Self { joint, config }
    }

    pub async fn execute(&self, input: CreateAccountInput) -> SecureResult<UserId> {
        let login = Login::new(input.login).map_err(invalid_argument)?;
        let password = Password::new(input.password).map_err(invalid_argument)?;
        password
            .fits_pepper(self.config.pepper())
            .map_err(invalid_argument)?;
        let password_hash = hash_password(&self.config, password).await?;

        let account = Account {
            login,
            user_id: input.user_id.unwrap_or_default(),
            password_hash,
            state: AccountState::Enabled,
        };
        self.joint.create_account(&account).await.service_err()?;

        Ok(account.user_id)
    }
}
