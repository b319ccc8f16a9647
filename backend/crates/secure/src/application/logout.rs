//! Logout Use Case
//!
//! Ends every live session of a user.

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;
use kernel::error::app_error::AppError;
use kernel::error::messages::service;
use platform::metrics::AuthMetrics;

use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::UserId;
use crate::error::SecureResult;
use crate::infra::joint::JointRepository;

pub struct LogoutUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
    metrics: Arc<dyn AuthMetrics>,
}

impl<P, M> LogoutUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>, metrics: Arc<dyn AuthMetrics>) -> Self {
        Self { joint, metrics }
    }

    /// Returns how many sessions were closed
    pub async fn execute(&self, user_id: &UserId) -> SecureResult<u64> {
        let closed = self.joint.delete_user_sessions(user_id).await.service_err()?;
        if closed == 0 {
            return Err(AppError::service(service::ERROR_LOGOUT));
        }

        self.metrics.inc_logout();
        tracing::info!(%user_id, sessions = closed, "User logged out");
        Ok(closed)
    }
}
