//! Set Account State Use Case

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;

use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::{AccountState, Login};
use crate::error::SecureResult;
use crate::infra::joint::JointRepository;

pub struct SetAccountStateUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
}

impl<P, M> SetAccountStateUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>) -> Self {
        Self { joint }
    }

    /// Disabling an account also closes its live sessions
    pub async fn execute(&self, login: &Login, state: AccountState) -> SecureResult<()> {
        self.joint.set_account_state(login, state).await.service_err()?;

        if !state.can_login() {
            let found = self.joint.get_id_and_hash(login).await.service_err()?;
            let closed = self
                .joint
                .delete_user_sessions(&found.user_id)
                .await
                .service_err()?;
            tracing::info!(%login, sessions = closed, "Sessions of disabled account closed");
        }
        Ok(())
    }
}
