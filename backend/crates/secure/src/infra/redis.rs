//! Redis memory store

use std::panic::Location;

use kernel::error::app_error::{AppError, AppResult};
use kernel::error::kind::ErrorKind;
use kernel::error::messages::in_memory;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::domain::entity::{IdAndHash, Scope};
use crate::domain::repository::MemoryRepository;
use crate::domain::value_object::{AccountState, Login, SessionToken, Ttl, UserId};
use crate::infra::keys;

/// Connection settings for the memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisOptions {
    /// `host:port`
    pub address: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub db: i64,
}

impl RedisOptions {
    pub fn connection_info(&self) -> AppResult<redis::ConnectionInfo> {
        let (host, port) = match self.address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    AppError::in_memory(in_memory::CONNECTION_FAILED).with_source(e)
                })?;
                (host.to_string(), port)
            }
            None => (self.address.clone(), 6379),
        };

        Ok(redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(host, port),
            redis: redis::RedisConnectionInfo {
                db: self.db,
                username: self.user.clone().filter(|u| !u.is_empty()),
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..Default::default()
            },
        })
    }
}

/// Map a redis error into the in-memory vocabulary
pub(crate) fn from_redis(err: redis::RedisError, origin: &'static Location<'static>) -> AppError {
    let message = if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        in_memory::CONNECTION_FAILED
    } else {
        in_memory::COMMAND_FAILED
    };
    AppError::at(ErrorKind::InMemory, message, origin).with_source(err)
}

trait RedisResultExt<T> {
    fn memory_err(self) -> AppResult<T>;
}

impl<T> RedisResultExt<T> for redis::RedisResult<T> {
    #[track_caller]
    fn memory_err(self) -> AppResult<T> {
        let origin = Location::caller();
        self.map_err(|e| from_redis(e, origin))
    }
}

#[track_caller]
fn required<T>(value: Option<T>) -> AppResult<T> {
    value.ok_or_else(|| AppError::in_memory(in_memory::EMPTY_RESULT))
}

/// Redis-backed [`MemoryRepository`]
///
/// `ConnectionManager` multiplexes one connection and reconnects on its
/// own; clones share it.
#[derive(Clone)]
pub struct RedisMemoryRepository {
    conn: ConnectionManager,
}

impl RedisMemoryRepository {
    pub async fn connect(options: &RedisOptions) -> AppResult<Self> {
        let client = redis::Client::open(options.connection_info()?).memory_err()?;
        let conn = ConnectionManager::new(client).await.memory_err()?;
        tracing::info!(address = %options.address, db = options.db, "Connected to memory store");
        Ok(Self { conn })
    }

    async fn set_px(&self, key: String, value: String, ttl: Ttl) -> AppResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .memory_err()
    }

    async fn get_string(&self, key: String) -> AppResult<String> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await.memory_err()?;
        required(value)
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let mut found = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(pattern).await.memory_err()?;
            while let Some(key) = iter.next_item().await {
                found.push(key);
            }
        }
        if found.is_empty() {
            return Ok(());
        }
        conn.del::<_, ()>(found).await.memory_err()
    }
}

impl MemoryRepository for RedisMemoryRepository {
    async fn save_session(&self, token: &SessionToken, user_id: &UserId, ttl: Ttl) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let index = keys::user_sessions(user_id);
        let millis = ttl.as_millis().max(1);

        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("SET")
            .arg(keys::session(token))
            .arg(user_id.to_string())
            .arg("PX")
            .arg(millis)
            .ignore()
            .cmd("SADD")
            .arg(&index)
            .arg(token.expose())
            .ignore()
            // Sessions share one lifetime, so the newest one bounds the index
            .cmd("PEXPIRE")
            .arg(&index)
            .arg(millis)
            .ignore();
        pipe.query_async::<_, ()>(&mut conn).await.memory_err()
    }

    async fn get_session_user_id(&self, token: &SessionToken) -> AppResult<UserId> {
        let raw = self.get_string(keys::session(token)).await?;
        keys::decode_user_id(&raw)
    }

    async fn delete_session(&self, token: &SessionToken) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let key = keys::session(token);
        let owner: Option<String> = conn.get(&key).await.memory_err()?;

        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(&key).ignore();
        // An unreadable owner only leaves the token in the index until it expires
        if let Some(user_id) = owner.as_deref().and_then(|raw| keys::decode_user_id(raw).ok()) {
            pipe.cmd("SREM")
                .arg(keys::user_sessions(&user_id))
                .arg(token.expose())
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await.memory_err()
    }

    async fn delete_user_sessions(&self, user_id: &UserId) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let index = keys::user_sessions(user_id);

        let tokens: Vec<String> = conn.smembers(&index).await.memory_err()?;
        if tokens.is_empty() {
            return Ok(0);
        }

        let session_keys: Vec<String> = tokens
            .iter()
            .map(|t| format!("{}:{t}", keys::SESSION_PREFIX))
            .collect();
        let deleted: u64 = conn.del(session_keys).await.memory_err()?;
        conn.del::<_, ()>(index).await.memory_err()?;
        Ok(deleted)
    }

    async fn drop_all_sessions(&self) -> AppResult<()> {
        for pattern in keys::all_sessions_patterns() {
            self.delete_matching(&pattern).await?;
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
        self.set_px(
            keys::permission_numbers(scope, name, user_id),
            keys::encode_numbers(numbers),
            ttl,
        )
        .await
    }

    async fn get_permission_numbers(
        &self,
        scope: Scope,
        name: &str,
        user_id: &UserId,
    ) -> AppResult<Vec<i32>> {
        let raw = self
            .get_string(keys::permission_numbers(scope, name, user_id))
            .await?;
        keys::decode_numbers(&raw)
    }

    async fn drop_user_permission_numbers(&self, user_id: &UserId) -> AppResult<()> {
        for pattern in keys::user_permission_patterns(user_id) {
            self.delete_matching(&pattern).await?;
        }
        Ok(())
    }

    async fn drop_scope_permission_numbers(&self, scope: Scope, name: &str) -> AppResult<()> {
        self.delete_matching(&keys::scope_permission_pattern(scope, name))
            .await
    }

    async fn save_login_to_id_and_hash(
        &self,
        login: &Login,
        value: &IdAndHash,
        ttl: Ttl,
    ) -> AppResult<()> {
        self.set_px(keys::id_and_hash(login), keys::encode_id_and_hash(value), ttl)
            .await
    }

    async fn get_id_and_hash(&self, login: &Login) -> AppResult<IdAndHash> {
        let raw = self.get_string(keys::id_and_hash(login)).await?;
        keys::decode_id_and_hash(&raw)
    }

    async fn save_account_state(
        &self,
        login: &Login,
        state: AccountState,
        ttl: Ttl,
    ) -> AppResult<()> {
        self.set_px(keys::account_state(login), keys::encode_state(state), ttl)
            .await
    }

    async fn get_account_state(&self, login: &Login) -> AppResult<AccountState> {
        let raw = self.get_string(keys::account_state(login)).await?;
        keys::decode_state(&raw)
    }

    async fn drop_account_state(&self, login: &Login) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(keys::account_state(login)).await.memory_err()
    }
}
