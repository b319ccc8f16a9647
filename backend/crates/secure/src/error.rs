//! Secure Error Types
//!
//! The service reports every failure as a [`kernel`] `AppError`; this module
//! gathers the pieces the layers of this crate use.

pub use kernel::error::adapter::{AdaptExt, to_joint, to_service};
pub use kernel::error::app_error::{AppError, AppResult};
pub use kernel::error::kind::ErrorKind;
pub use kernel::error::messages;

/// Result of a service-layer operation
pub type SecureResult<T> = AppResult<T>;

/// Malformed client input
#[track_caller]
pub fn invalid_argument<E>(err: E) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AppError::service(messages::service::INVALID_ARGUMENT).with_source(err)
}

/// Authentication failure that must not reveal which check failed
#[track_caller]
pub fn incorrect_credentials() -> AppError {
    AppError::service(messages::service::INCORRECT_CREDENTIALS)
}
