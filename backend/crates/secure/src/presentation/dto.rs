//! API DTOs (Data Transfer Objects)
//!
//! RBAC records and edges are accepted as-is from `domain::entity`.

use serde::{Deserialize, Serialize};

use crate::domain::value_object::{AccountState, Login, UserId};

// ============================================================================
// Sessions
// ============================================================================

/// Login / get-token response
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub closed_sessions: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetTokenQuery {
    pub instance: String,
}

// ============================================================================
// Permissions
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PermissionNumbersResponse {
    pub numbers: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionNumberQuery {
    pub name: String,
    pub instance: String,
}

/// Number of a single permission, also returned on creation
#[derive(Debug, Clone, Serialize)]
pub struct PermissionNumberResponse {
    pub number: i32,
}

// ============================================================================
// Administration
// ============================================================================

#[derive(Deserialize)]
pub struct CreateAccountRequest {
    pub login: String,
    pub password: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl std::fmt::Debug for CreateAccountRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateAccountRequest")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateAccountResponse {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetAccountStateRequest {
    pub login: Login,
    pub state: AccountState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_state_request_validates() {
        let ok: SetAccountStateRequest =
            serde_json::from_str(r#"{"login":"alice_01","state":2}"#).unwrap();
        assert_eq!(ok.state, AccountState::Disabled);

        assert!(serde_json::from_str::<SetAccountStateRequest>(r#"{"login":"al","state":2}"#).is_err());
        assert!(
            serde_json::from_str::<SetAccountStateRequest>(r#"{"login":"alice_01","state":3}"#)
                .is_err()
        );
    }

    #[test]
    fn test_create_account_request_debug_is_redacted() {
        let req: CreateAccountRequest =
            serde_json::from_str(r#"{"login":"alice_01","password":"Correct_1"}"#).unwrap();
        assert!(req.user_id.is_none());
        assert!(!format!("{req:?}").contains("Correct_1"));
    }
}
