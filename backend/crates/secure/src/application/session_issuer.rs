//! Session issuing shared by login and token minting

use kernel::error::adapter::AdaptExt;
use kernel::error::app_error::AppError;
use kernel::error::messages::service;

use crate::domain::entity::Session;
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::{SessionToken, UserId};
use crate::error::SecureResult;
use crate::infra::joint::JointRepository;

/// Fresh tokens drawn before giving up on collisions
pub const MAX_TOKEN_ATTEMPTS: usize = 5;

/// Draw a token nobody holds and bind it to `user_id`
pub(crate) async fn issue_session<P, M>(
    joint: &JointRepository<P, M>,
    token_length: usize,
    user_id: &UserId,
) -> SecureResult<Session>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    for _ in 0..MAX_TOKEN_ATTEMPTS {
        let token = SessionToken::generate(token_length);
        if joint.session_exists(&token).await.service_err()? {
            tracing::warn!(%user_id, "Session token collision, drawing again");
            continue;
        }
        joint.save_session(&token, user_id).await.service_err()?;
        return Ok(Session::new(token, *user_id, joint.ttl().session));
    }
    Err(AppError::service(service::TOKEN_GENERATION_FAILED))
}
