//! Session Entity
//!
//! A live bearer-token binding. Sessions only live in the in-memory store;
//! nothing about them is written to the relational database.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{SessionToken, Ttl, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    /// Lifetime in the cache; `None` for a session read back by token
    pub ttl: Option<Ttl>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session that expires `ttl` from now
    pub fn new(token: SessionToken, user_id: UserId, ttl: Ttl) -> Self {
        let expires_at = chrono::Duration::from_std(ttl.as_duration())
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d));

        Self {
            token,
            user_id,
            ttl: Some(ttl),
            expires_at,
        }
    }

    /// Session known only by its token and owner
    pub fn bound(token: SessionToken, user_id: UserId) -> Self {
        Self {
            token,
            user_id,
            ttl: None,
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_sets_expiry() {
        let session = Session::new(
            SessionToken::generate(24),
            UserId::new(),
            Ttl::new(Duration::from_secs(3600)),
        );
        assert!(!session.is_expired());
        let remaining = session.expires_at.unwrap() - Utc::now();
        assert!(remaining.num_seconds() > 3500);
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let session = Session::new(SessionToken::generate(24), UserId::new(), Ttl::default());
        assert!(session.is_expired());
    }

    #[test]
    fn test_bound_never_expires_locally() {
        let session = Session::bound(SessionToken::generate(24), UserId::new());
        assert!(session.ttl.is_none());
        assert!(!session.is_expired());
    }
}
