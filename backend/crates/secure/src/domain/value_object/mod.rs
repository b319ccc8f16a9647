//! Value Objects
//!
//! Self-validating domain primitives.

pub mod account_state;
pub mod login;
pub mod password;
pub mod permission_number;
pub mod session_token;
pub mod ttl;
pub mod user_id;

pub use account_state::AccountState;
pub use login::Login;
pub use password::{Password, PasswordHash};
pub use permission_number::{PermissionNumber, PermissionNumbers};
pub use session_token::SessionToken;
pub use ttl::Ttl;
pub use user_id::UserId;
