//! bcrypt on the blocking pool
//!
//! Hashing and verification take tens of milliseconds at realistic costs
//! and must not stall the async workers.

use kernel::error::app_error::{AppError, AppResult};
use kernel::error::messages::service;

use crate::application::config::SecureConfig;
use crate::domain::value_object::{Password, PasswordHash};

pub(crate) async fn hash_password(config: &SecureConfig, password: Password) -> AppResult<PasswordHash> {
    let cost = config.password_creation_cost;
    let pepper = config.pepper().map(<[u8]>::to_vec);

    tokio::task::spawn_blocking(move || password.hash(cost, pepper.as_deref()))
        .await
        .map_err(|e| AppError::service(service::HASHING_FAILED).with_source(e))?
        .map_err(|e| AppError::service(service::HASHING_FAILED).with_source(e))
}

pub(crate) async fn verify_password(
    config: &SecureConfig,
    password: Password,
    hash: PasswordHash,
) -> AppResult<bool> {
    let pepper = config.pepper().map(<[u8]>::to_vec);

    tokio::task::spawn_blocking(move || hash.verify(&password, pepper.as_deref()))
        .await
        .map_err(|e| AppError::service(service::HASHING_FAILED).with_source(e))?
        .map_err(|e| AppError::service(service::HASHING_FAILED).with_source(e))
}
