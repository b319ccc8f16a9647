//! In-process memory store
//!
//! Same contract and key layout as the Redis store, backed by a map with
//! lazy expiry. Every `SWEEP_EVERY` writes the whole map is swept, so
//! entries nobody reads again do not accumulate. Used by tests and
//! single-node setups without Redis.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use kernel::error::app_error::{AppError, AppResult};
use kernel::error::messages::in_memory;

use crate::domain::entity::{IdAndHash, Scope};
use crate::domain::repository::MemoryRepository;
use crate::domain::value_object::{AccountState, Login, SessionToken, Ttl, UserId};
use crate::infra::keys;

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

const SWEEP_EVERY: usize = 128;

type Entries = HashMap<String, Entry>;

#[derive(Debug, Default)]
pub struct ProcessMemoryRepository {
    entries: Mutex<Entries>,
    writes: AtomicUsize,
}

fn sweep(entries: &mut Entries, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, e| e.is_live(now));
    before - entries.len()
}

impl ProcessMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn after_write(&self, entries: &mut Entries) {
        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY == 0 {
            let removed = sweep(entries, Instant::now());
            if removed > 0 {
                tracing::debug!(removed, remaining = entries.len(), "Swept expired entries");
            }
        }
    }

    fn set_text(&self, key: String, value: String, ttl: Ttl) {
        let entry = Entry {
            value: Value::Text(value),
            expires_at: Instant::now().checked_add(ttl.as_duration()),
        };
        let mut entries = self.entries();
        entries.insert(key, entry);
        self.after_write(&mut entries);
    }

    fn get_text(&self, key: &str) -> AppResult<String> {
        let mut entries = self.entries();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if !entry.is_live(now) => {
                entries.remove(key);
                Err(AppError::in_memory(in_memory::EMPTY_RESULT))
            }
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(text.clone()),
            Some(_) => Err(AppError::in_memory(in_memory::MALFORMED_VALUE)),
            None => Err(AppError::in_memory(in_memory::EMPTY_RESULT)),
        }
    }

    fn delete_matching(&self, pattern: &str) {
        self.entries()
            .retain(|key, _| !keys::glob_match(pattern, key));
    }
}

#[cfg(test)]
impl ProcessMemoryRepository {
    fn cleanup_expired(&self) -> usize {
        sweep(&mut self.entries(), Instant::now())
    }

    /// Entries held in the map, expired or not
    fn stored(&self) -> usize {
        self.entries().len()
    }

    /// Number of live keys
    fn len(&self) -> usize {
        let now = Instant::now();
        self.entries().values().filter(|e| e.is_live(now)).count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries().get(key).is_some_and(|e| e.is_live(now))
    }
}

impl MemoryRepository for ProcessMemoryRepository {
    async fn save_session(&self, token: &SessionToken, user_id: &UserId, ttl: Ttl) -> AppResult<()> {
        let expires_at = Instant::now().checked_add(ttl.as_duration());
        let mut entries = self.entries();

        entries.insert(
            keys::session(token),
            Entry {
                value: Value::Text(user_id.to_string()),
                expires_at,
            },
        );

        let index_key = keys::user_sessions(user_id);
        let now = Instant::now();
        let index = entries
            .entry(index_key)
            .and_modify(|e| {
                if !e.is_live(now) {
                    e.value = Value::Set(HashSet::new());
                }
            })
            .or_insert_with(|| Entry {
                value: Value::Set(HashSet::new()),
                expires_at,
            });
        if let Value::Set(tokens) = &mut index.value {
            tokens.insert(token.expose().to_string());
        } else {
            index.value = Value::Set(HashSet::from([token.expose().to_string()]));
        }
        // The index lives as long as its longest session
        index.expires_at = match (index.expires_at, expires_at) {
            (Some(current), Some(new)) => Some(current.max(new)),
            _ => None,
        };
        self.after_write(&mut entries);
        Ok(())
    }

    async fn get_session_user_id(&self, token: &SessionToken) -> AppResult<UserId> {
        let raw = self.get_text(&keys::session(token))?;
        keys::decode_user_id(&raw)
    }

    async fn delete_session(&self, token: &SessionToken) -> AppResult<()> {
        let mut entries = self.entries();
        let owner = match entries.remove(&keys::session(token)) {
            Some(Entry {
                value: Value::Text(raw),
                ..
            }) => keys::decode_user_id(&raw).ok(),
            _ => None,
        };
        let Some(user_id) = owner else {
            return Ok(());
        };

        let index_key = keys::user_sessions(&user_id);
        let emptied = match entries.get_mut(&index_key) {
            Some(Entry {
                value: Value::Set(tokens),
                ..
            }) => {
                tokens.remove(token.expose());
                tokens.is_empty()
            }
            _ => false,
        };
        if emptied {
            entries.remove(&index_key);
        }
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &UserId) -> AppResult<u64> {
        let mut entries = self.entries();
        let now = Instant::now();

        let tokens = match entries.remove(&keys::user_sessions(user_id)) {
            Some(Entry {
                value: Value::Set(tokens),
                ..
            }) => tokens,
            _ => return Ok(0),
        };

        let mut deleted = 0;
        for token in tokens {
            let key = format!("{}:{token}", keys::SESSION_PREFIX);
            if entries.remove(&key).is_some_and(|e| e.is_live(now)) {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn drop_all_sessions(&self) -> AppResult<()> {
        for pattern in keys::all_sessions_patterns() {
            self.delete_matching(&pattern);
        }
        Ok(())
    }

    async fn save_permission_numbers(
        &self,
        scope: Scope,
        name: &str,
        user_id: &UserId,
        numbers: &[i32],
        ttl: Ttl,
    ) -> AppResult<()> {
        self.set_text(
            keys::permission_numbers(scope, name, user_id),
            keys::encode_numbers(numbers),
            ttl,
        );
        Ok(())
    }

    async fn get_permission_numbers(
        &self,
        scope: Scope,
        name: &str,
        user_id: &UserId,
    ) -> AppResult<Vec<i32>> {
        let raw = self.get_text(&keys::permission_numbers(scope, name, user_id))?;
        keys::decode_numbers(&raw)
    }

    async fn drop_user_permission_numbers(&self, user_id: &UserId) -> AppResult<()> {
        for pattern in keys::user_permission_patterns(user_id) {
            self.delete_matching(&pattern);
        }
        Ok(())
    }

    async fn drop_scope_permission_numbers(&self, scope: Scope, name: &str) -> AppResult<()> {
        self.delete_matching(&keys::scope_permission_pattern(scope, name));
        Ok(())
    }

    async fn save_login_to_id_and_hash(
        &self,
        login: &Login,
        value: &IdAndHash,
        ttl: Ttl,
    ) -> AppResult<()> {
        self.set_text(keys::id_and_hash(login), keys::encode_id_and_hash(value), ttl);
        Ok(())
    }

    async fn get_id_and_hash(&self, login: &Login) -> AppResult<IdAndHash> {
        let raw = self.get_text(&keys::id_and_hash(login))?;
        keys::decode_id_and_hash(&raw)
    }

    async fn save_account_state(
        &self,
        login: &Login,
        state: AccountState,
        ttl: Ttl,
    ) -> AppResult<()> {
        self.set_text(keys::account_state(login), keys::encode_state(state), ttl);
        Ok(())
    }

    async fn get_account_state(&self, login: &Login) -> AppResult<AccountState> {
        let raw = self.get_text(&keys::account_state(login))?;
        keys::decode_state(&raw)
    }

    async fn drop_account_state(&self, login: &Login) -> AppResult<()> {
        self.entries().remove(&keys::account_state(login));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::error::kind::ErrorKind;
    use std::time::Duration;

    fn ttl(secs: u64) -> Ttl {
        Ttl::new(Duration::from_secs(secs))
    }

    fn token() -> SessionToken {
        SessionToken::generate(24)
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let store = ProcessMemoryRepository::new();
        let (token, user_id) = (token(), UserId::new());

        store.save_session(&token, &user_id, ttl(60)).await.unwrap();
        assert_eq!(store.get_session_user_id(&token).await.unwrap(), user_id);

        store.delete_session(&token).await.unwrap();
        let err = store.get_session_user_id(&token).await.unwrap_err();
        assert!(err.is(ErrorKind::InMemory, in_memory::EMPTY_RESULT));
    }

    #[tokio::test]
    async fn test_delete_session_leaves_index_without_token() {
        let store = ProcessMemoryRepository::new();
        let user_id = UserId::new();
        let (first, second) = (token(), token());
        store.save_session(&first, &user_id, ttl(60)).await.unwrap();
        store.save_session(&second, &user_id, ttl(60)).await.unwrap();

        store.delete_session(&first).await.unwrap();
        assert_eq!(store.delete_user_sessions(&user_id).await.unwrap(), 1);

        store.save_session(&first, &user_id, ttl(60)).await.unwrap();
        store.delete_session(&first).await.unwrap();
        assert!(!store.contains_key(&keys::user_sessions(&user_id)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_session_expires() {
        let store = ProcessMemoryRepository::new();
        let (token, user_id) = (token(), UserId::new());

        store
            .save_session(&token, &user_id, Ttl::new(Duration::from_millis(50)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        let err = store.get_session_user_id(&token).await.unwrap_err();
        assert!(err.is_empty_result());
    }

    #[tokio::test]
    async fn test_cleanup_expired_releases_unread_entries() {
        let store = ProcessMemoryRepository::new();
        let short = Ttl::new(Duration::from_millis(30));
        for _ in 0..3 {
            store.save_session(&token(), &UserId::new(), short).await.unwrap();
        }
        store
            .save_account_state(&Login::new("alice_01").unwrap(), AccountState::Enabled, ttl(60))
            .await
            .unwrap();
        assert_eq!(store.stored(), 7);

        tokio::time::sleep(Duration::from_millis(80)).await;
        // Three sessions and their three indexes
        assert_eq!(store.cleanup_expired(), 6);
        assert_eq!(store.stored(), 1);
        assert!(store.contains_key("as:alice_01"));
    }

    #[tokio::test]
    async fn test_writes_sweep_expired_entries() {
        let store = ProcessMemoryRepository::new();
        let short = Ttl::new(Duration::from_millis(30));
        for _ in 0..10 {
            store.save_session(&token(), &UserId::new(), short).await.unwrap();
        }
        assert_eq!(store.stored(), 20);
        tokio::time::sleep(Duration::from_millis(80)).await;

        let login = Login::new("alice_01").unwrap();
        for _ in 0..SWEEP_EVERY {
            store
                .save_account_state(&login, AccountState::Enabled, ttl(60))
                .await
                .unwrap();
        }
        assert_eq!(store.stored(), 1);
    }

    #[tokio::test]
    async fn test_delete_user_sessions() {
        let store = ProcessMemoryRepository::new();
        let user_id = UserId::new();
        let other = UserId::new();
        let (first, second, foreign) = (token(), token(), token());

        store.save_session(&first, &user_id, ttl(60)).await.unwrap();
        store.save_session(&second, &user_id, ttl(60)).await.unwrap();
        store.save_session(&foreign, &other, ttl(60)).await.unwrap();

        assert_eq!(store.delete_user_sessions(&user_id).await.unwrap(), 2);
        assert!(store.get_session_user_id(&first).await.is_err());
        assert!(store.get_session_user_id(&second).await.is_err());
        assert_eq!(store.get_session_user_id(&foreign).await.unwrap(), other);

        assert_eq!(store.delete_user_sessions(&user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_drop_all_sessions_keeps_other_keys() {
        let store = ProcessMemoryRepository::new();
        let login = Login::new("alice_01").unwrap();
        store.save_session(&token(), &UserId::new(), ttl(60)).await.unwrap();
        store
            .save_account_state(&login, AccountState::Enabled, ttl(60))
            .await
            .unwrap();

        store.drop_all_sessions().await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("as:alice_01"));
    }

    #[tokio::test]
    async fn test_permission_numbers_and_drops() {
        let store = ProcessMemoryRepository::new();
        let user_id = UserId::new();
        let other = UserId::new();

        store
            .save_permission_numbers(Scope::Service, "store", &user_id, &[1, 2], ttl(60))
            .await
            .unwrap();
        store
            .save_permission_numbers(Scope::Instance, "store-1", &user_id, &[3], ttl(60))
            .await
            .unwrap();
        store
            .save_permission_numbers(Scope::Service, "store", &other, &[1], ttl(60))
            .await
            .unwrap();

        assert_eq!(
            store
                .get_permission_numbers(Scope::Service, "store", &user_id)
                .await
                .unwrap(),
            vec![1, 2]
        );

        store.drop_user_permission_numbers(&user_id).await.unwrap();
        assert!(
            store
                .get_permission_numbers(Scope::Instance, "store-1", &user_id)
                .await
                .is_err()
        );
        assert!(
            store
                .get_permission_numbers(Scope::Service, "store", &other)
                .await
                .is_ok()
        );

        store
            .drop_scope_permission_numbers(Scope::Service, "store")
            .await
            .unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_account_state() {
        let store = ProcessMemoryRepository::new();
        let login = Login::new("alice_01").unwrap();

        assert!(store.get_account_state(&login).await.unwrap_err().is_empty_result());
        store
            .save_account_state(&login, AccountState::Disabled, ttl(60))
            .await
            .unwrap();
        assert_eq!(
            store.get_account_state(&login).await.unwrap(),
            AccountState::Disabled
        );
        store.drop_account_state(&login).await.unwrap();
        assert!(store.get_account_state(&login).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_state_is_not_numeric() {
        let store = ProcessMemoryRepository::new();
        store.set_text("as:bob_01".into(), "enabled".into(), ttl(60));
        let login = Login::new("bob_01").unwrap();
        let err = store.get_account_state(&login).await.unwrap_err();
        assert!(err.is(ErrorKind::InMemory, in_memory::NOT_NUMERIC));
    }
}
