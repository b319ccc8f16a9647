//! Check Session Use Case
//!
//! Resolves a bearer token to its owner. Reads the memory store only.

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;
use kernel::error::app_error::AppError;
use kernel::error::messages::service;

use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::{SessionToken, UserId};
use crate::error::SecureResult;
use crate::infra::joint::JointRepository;

pub struct CheckSessionUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
}

impl<P, M> CheckSessionUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>) -> Self {
        Self { joint }
    }

    /// Owner of a live session; a malformed or unknown token is
    /// `empty result`
    pub async fn execute(&self, token: &str) -> SecureResult<UserId> {
        let Ok(token) = SessionToken::new(token) else {
            return Err(AppError::service(service::EMPTY_RESULT));
        };
        self.joint.get_session_user_id(&token).await.service_err()
    }
}
