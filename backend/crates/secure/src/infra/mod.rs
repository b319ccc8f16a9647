//! Infrastructure Layer
//!
//! Storage and broker adapters behind the domain capability traits.

pub mod broker;
pub mod joint;
pub mod keys;
pub mod local;
pub mod postgres;
pub mod redis;
pub mod state_locker;

pub use broker::{BrokerOptions, NotificationProducer, RedisBrokerProducer};
pub use joint::{CacheTtl, JointRepository};
pub use local::ProcessMemoryRepository;
pub use postgres::{PostgresOptions, PostgresRepository};
pub use self::redis::{RedisMemoryRepository, RedisOptions};
pub use state_locker::{StateGuard, StateLocker};
