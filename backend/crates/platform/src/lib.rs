//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Password policy, bcrypt hashing and verification
//! - Opaque token generation (random bytes, URL-safe Base64)
//! - `Authorization` header parsing (Basic / Bearer)
//! - Prometheus counters behind a metrics capability
//! - Bounded retry loop for outbound producers

pub mod credentials;
pub mod crypto;
pub mod metrics;
pub mod password;
pub mod retry;
