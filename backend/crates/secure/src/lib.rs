//! Secure: authentication, sessions and RBAC
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Use cases and configuration
//! - `infra/` - PostgreSQL, Redis, process memory, broker, joint repository
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Storage Model
//! - PostgreSQL is the source of truth for accounts and the permission graph
//! - Sessions live only in the memory store, with a TTL
//! - Account states and permission numbers are cached in the memory store
//! - Reads for one login that miss the cache are serialized per login
//!
//! ## Security Model
//! - Passwords hashed with bcrypt, optional pepper
//! - Opaque bearer tokens issued on Basic login
//! - Disabling an account closes all of its sessions

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod testing;

pub use application::config::SecureConfig;
pub use application::{BootReport, BootUseCase};
pub use error::SecureResult;
pub use infra::{
    CacheTtl, JointRepository, NotificationProducer, PostgresOptions, PostgresRepository,
    ProcessMemoryRepository, RedisMemoryRepository, RedisOptions,
};
pub use presentation::{RouteError, RouteRegistry, SecureAppState, secure_router};

pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
