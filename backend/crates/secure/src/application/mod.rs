//! Application Layer
//!
//! Use cases and application services.

pub mod account_state;
pub mod boot;
pub mod check_session;
pub mod config;
pub mod create_account;
pub mod create_token;
pub mod login;
pub mod logout;
mod password;
pub mod permissions;
pub mod rbac;
pub mod session_issuer;

// Re-exports
pub use account_state::SetAccountStateUseCase;
pub use boot::{BootReport, BootUseCase};
pub use check_session::CheckSessionUseCase;
pub use config::SecureConfig;
pub use create_account::{CreateAccountInput, CreateAccountUseCase};
pub use create_token::CreateTokenUseCase;
pub use login::LoginUseCase;
pub use logout::LogoutUseCase;
pub use permissions::PermissionsUseCase;
pub use rbac::RbacUseCase;

#[cfg(test)]
mod tests;
