//! Application Configuration
//!
//! Settings the use cases need. Loading from files and the environment is
//! done by the binary.

use std::fmt;
use std::time::Duration;

use crate::domain::value_object::Ttl;
use crate::infra::joint::CacheTtl;

/// Default length of issued session tokens
pub const DEFAULT_LOGIN_TOKEN_LENGTH: usize = 24;

/// Payload announcing that an instance dropped its sessions
pub const DEFAULT_INVALIDATION_PAYLOAD: &str = "service upload";

/// Secure application configuration
#[derive(Clone)]
pub struct SecureConfig {
    /// Administrative account ensured at boot
    pub root_login: String,
    pub root_password: String,
    /// Application-wide pepper appended to passwords before hashing
    pub salt: Option<Vec<u8>>,
    pub login_token_length: usize,
    /// bcrypt cost for new hashes
    pub password_creation_cost: u32,
    pub session_ttl: Duration,
    pub permission_cache_ttl: Duration,
    /// Lifetime of `uh:` and `as:` entries
    pub account_cache_ttl: Duration,
    pub invalidation_payload: String,
}

impl Default for SecureConfig {
    fn default() -> Self {
        Self {
            root_login: "root".to_string(),
            root_password: String::new(),
            salt: None,
            login_token_length: DEFAULT_LOGIN_TOKEN_LENGTH,
            password_creation_cost: platform::password::DEFAULT_COST,
            session_ttl: Duration::from_secs(24 * 3600), // 1 day
            permission_cache_ttl: Duration::from_secs(10 * 60), // 10 minutes
            account_cache_ttl: Duration::from_secs(24 * 3600),
            invalidation_payload: DEFAULT_INVALIDATION_PAYLOAD.to_string(),
        }
    }
}

impl fmt::Debug for SecureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureConfig")
            .field("root_login", &self.root_login)
            .field("root_password", &"[REDACTED]")
            .field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
            .field("login_token_length", &self.login_token_length)
            .field("password_creation_cost", &self.password_creation_cost)
            .field("session_ttl", &self.session_ttl)
            .field("permission_cache_ttl", &self.permission_cache_ttl)
            .field("account_cache_ttl", &self.account_cache_ttl)
            .field("invalidation_payload", &self.invalidation_payload)
            .finish()
    }
}

impl SecureConfig {
    /// Get the password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.salt.as_deref().filter(|s| !s.is_empty())
    }

    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl {
            session: Ttl::new(self.session_ttl),
            permissions: Ttl::new(self.permission_cache_ttl),
            account: Ttl::new(self.account_cache_ttl),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SecureConfig::default();
        assert_eq!(config.login_token_length, 24);
        assert_eq!(config.invalidation_payload, "service upload");
        assert_eq!(config.cache_ttl().session.as_secs(), 86_400);
        assert_eq!(config.cache_ttl().permissions.as_secs(), 600);
        assert!(config.pepper().is_none());
    }

    #[test]
    fn test_empty_salt_is_no_pepper() {
        let config = SecureConfig {
            salt: Some(Vec::new()),
            ..Default::default()
        };
        assert!(config.pepper().is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SecureConfig {
            root_password: "Root_pass1".into(),
            salt: Some(b"pepper".to_vec()),
            ..Default::default()
        };
        let out = format!("{config:?}");
        assert!(!out.contains("Root_pass1"));
        assert!(out.contains("salt: Some(\"[REDACTED]\")"));
    }
}
