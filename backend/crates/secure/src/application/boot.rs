//! Boot Use Case
//!
//! Brings storage into a serving state when the process starts:
//!
//! 1. Create the schema and tables
//! 2. Forget sessions (they do not survive a restart)
//! 3. Ensure the root account exists
//! 4. Prime the account-state cache
//! 5. Tell peer instances this one restarted

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;

use crate::application::config::SecureConfig;
use crate::application::create_account::{CreateAccountInput, CreateAccountUseCase};
use crate::domain::repository::{BrokerProducer, MemoryRepository, PersistentRepository};
use crate::domain::value_object::{Login, UserId};
use crate::error::{SecureResult, invalid_argument};
use crate::infra::joint::JointRepository;

/// What the boot sequence did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    pub root_user_id: UserId,
    pub root_created: bool,
    pub warmed_states: usize,
    pub announced: bool,
}

pub struct BootUseCase<P, M, B> {
    joint: Arc<JointRepository<P, M>>,
    config: Arc<SecureConfig>,
    producer: Arc<B>,
}

impl<P, M, B> BootUseCase<P, M, B>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
    B: BrokerProducer + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>, config: Arc<SecureConfig>, producer: Arc<B>) -> Self {
        Self {
            joint,
            config,
            producer,
        }
    }

    pub async fn execute(&self) -> SecureResult<BootReport> {
        self.joint.bootstrap_schema().await.service_err()?;
        self.joint.drop_all_sessions().await.service_err()?;

        let (root_user_id, root_created) = self.ensure_root().await?;
        let warmed_states = self.joint.warm_account_states().await.service_err()?;

        // Peers only lose a hint if this fails
        let announced = match self
            .producer
            .send(self.config.invalidation_payload.as_bytes())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Failed to announce restart");
                false
            }
        };

        let report = BootReport {
            root_user_id,
            root_created,
            warmed_states,
            announced,
        };
        tracing::info!(?report, "Boot completed");
        Ok(report)
    }

    async fn ensure_root(&self) -> SecureResult<(UserId, bool)> {
        let login = Login::new(self.config.root_login.as_str()).map_err(invalid_argument)?;

        match self.joint.get_id_and_hash(&login).await {
            Ok(found) => return Ok((found.user_id, false)),
            Err(e) if e.is_empty_result() => {}
            Err(e) => return Err(e).service_err(),
        }

        let user_id = CreateAccountUseCase::new(Arc::clone(&self.joint), Arc::clone(&self.config))
            .execute(CreateAccountInput {
                login: self.config.root_login.clone(),
                password: self.config.root_password.clone(),
                user_id: None,
            })
            .await?;
        tracing::info!(%login, %user_id, "Root account created");
        Ok((user_id, true))
    }
}
