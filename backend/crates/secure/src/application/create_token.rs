//! Create Token Use Case
//!
//! Mints an additional session for service-to-service calls, scoped to an
//! instance the caller holds permissions on.

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;
use kernel::error::app_error::AppError;
use kernel::error::messages::service;

use crate::application::config::SecureConfig;
use crate::application::session_issuer::issue_session;
use crate::domain::entity::Session;
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::UserId;
use crate::error::SecureResult;
use crate::infra::joint::JointRepository;

pub struct CreateTokenUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
    config: Arc<SecureConfig>,
}

impl<P, M> CreateTokenUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>, config: Arc<SecureConfig>) -> Self {
        Self { joint, config }
    }

    pub async fn execute(&self, user_id: &UserId, instance: &str) -> SecureResult<Session> {
        let numbers = self
            .joint
            .instance_permissions_numbers(user_id, instance)
            .await
            .service_err()?;
        if numbers.is_empty() {
            return Err(AppError::service(service::ACCESS_DENIED));
        }

        let session = issue_session(&self.joint, self.config.login_token_length, user_id).await?;
        tracing::info!(%user_id, instance, "Instance token issued");
        Ok(session)
    }
}
