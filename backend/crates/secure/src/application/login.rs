//! Login Use Case
//!
//! Verifies a login/password pair and opens a session.

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;
use kernel::error::app_error::AppError;
use kernel::error::messages::service;
use platform::metrics::AuthMetrics;

use crate::application::config::SecureConfig;
use crate::application::password::verify_password;
use crate::application::session_issuer::issue_session;
use crate::domain::entity::Session;
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::{Login, Password};
use crate::error::{SecureResult, incorrect_credentials};
use crate::infra::joint::JointRepository;

pub struct LoginUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
    config: Arc<SecureConfig>,
    metrics: Arc<dyn AuthMetrics>,
}

impl<P, M> LoginUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(
        joint: Arc<JointRepository<P, M>>,
        config: Arc<SecureConfig>,
        metrics: Arc<dyn AuthMetrics>,
    ) -> Self {
        Self {
            joint,
            config,
            metrics,
        }
    }

    /// Returns the new session; every failed check counts as an
    /// authentication error
    pub async fn execute(&self, login: &str, password: &str) -> SecureResult<Session> {
        let result = self.authenticate(login, password).await;
        match &result {
            Ok(session) => {
                self.metrics.inc_login();
                tracing::info!(login, user_id = %session.user_id, "User logged in");
            }
            Err(e) if e.is_client_error() => {
                self.metrics.inc_authentication_error();
                tracing::info!(login, reason = e.message(), "Login rejected");
            }
            Err(_) => {}
        }
        result
    }

    async fn authenticate(&self, login: &str, password: &str) -> SecureResult<Session> {
        let (Ok(login), Ok(password)) = (Login::new(login), Password::new(password)) else {
            return Err(incorrect_credentials());
        };

        let state = match self.joint.get_account_state(&login).await {
            Ok(state) => state,
            Err(e) if e.is_empty_result() => return Err(incorrect_credentials()),
            Err(e) => return Err(e).service_err(),
        };
        if !state.can_login() {
            return Err(AppError::service(service::ACCOUNT_NOT_ACTIVE));
        }

        let found = match self.joint.get_id_and_hash(&login).await {
            Ok(found) => found,
            Err(e) if e.is_empty_result() => return Err(incorrect_credentials()),
            Err(e) => return Err(e).service_err(),
        };

        if !verify_password(&self.config, password, found.password_hash).await? {
            return Err(incorrect_credentials());
        }

        issue_session(&self.joint, self.config.login_token_length, &found.user_id).await
    }
}
