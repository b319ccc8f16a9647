//! Broker producer over Redis pub/sub
//!
//! Peer instances subscribe to one channel and receive raw UTF-8 payloads.
//! Pub/sub delivery is fire-and-forget: a peer that is not subscribed at
//! publish time never sees the message.

use std::sync::{Mutex, MutexGuard};

use kernel::error::app_error::{AppError, AppResult};
use kernel::error::messages::broker;
use platform::retry::{AttemptError, RetryError, RetryPolicy, retry};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::domain::repository::BrokerProducer;

/// Producer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerOptions {
    /// `redis://host:port[/db]`
    pub address: String,
    pub topic: String,
    pub retry: RetryPolicy,
}

/// Connection-level failures are worth another attempt; a rejected
/// command is not
fn is_transient(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}

#[track_caller]
fn from_retry(err: RetryError<redis::RedisError>) -> AppError {
    let message = match &err {
        RetryError::Exhausted {
            last: AttemptError::DeadlineExceeded,
            ..
        } => broker::WRITE_TIMEOUT,
        _ => broker::SEND_FAILED,
    };
    AppError::broker(message).with_source(err)
}

/// Connection slot emptied by `close`, which drops the connection
struct Writer<C> {
    conn: Mutex<Option<C>>,
}

impl<C: Clone> Writer<C> {
    fn new(conn: C) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<C>> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[track_caller]
    fn connection(&self) -> AppResult<C> {
        self.slot()
            .clone()
            .ok_or_else(|| AppError::broker(broker::SEND_FAILED))
    }

    #[track_caller]
    fn close(&self) -> AppResult<()> {
        match self.slot().take() {
            Some(_) => Ok(()),
            None => Err(AppError::broker(broker::FAILED_TO_CLOSE_WRITER)),
        }
    }
}

pub struct RedisBrokerProducer {
    writer: Writer<ConnectionManager>,
    topic: String,
    policy: RetryPolicy,
}

impl RedisBrokerProducer {
    pub async fn connect(options: &BrokerOptions) -> AppResult<Self> {
        let client = redis::Client::open(options.address.as_str())
            .map_err(|e| AppError::broker(broker::SEND_FAILED).with_source(e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::broker(broker::SEND_FAILED).with_source(e))?;

        tracing::info!(address = %options.address, topic = %options.topic, "Broker producer ready");

        Ok(Self {
            writer: Writer::new(conn),
            topic: options.topic.clone(),
            policy: options.retry,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl BrokerProducer for RedisBrokerProducer {
    async fn send(&self, payload: &[u8]) -> AppResult<()> {
        let conn = self.writer.connection()?;

        let receivers = retry(
            &self.policy,
            || {
                let mut conn = conn.clone();
                let topic = self.topic.clone();
                let payload = payload.to_vec();
                async move { conn.publish::<_, _, i64>(topic, payload).await }
            },
            is_transient,
        )
        .await
        .map_err(from_retry)?;

        tracing::debug!(topic = %self.topic, receivers, "Message published");
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.writer.close()?;
        tracing::info!(topic = %self.topic, "Broker producer closed");
        Ok(())
    }
}

/// Producer picked at startup
pub enum NotificationProducer {
    Redis(RedisBrokerProducer),
    /// Broker turned off, or unreachable at boot
    Disabled,
}

impl NotificationProducer {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Redis(_))
    }
}

impl BrokerProducer for NotificationProducer {
    async fn send(&self, payload: &[u8]) -> AppResult<()> {
        match self {
            Self::Redis(producer) => producer.send(payload).await,
            Self::Disabled => {
                tracing::debug!(bytes = payload.len(), "Broker disabled, message dropped");
                Ok(())
            }
        }
    }

    async fn close(&self) -> AppResult<()> {
        match self {
            Self::Redis(producer) => producer.close().await,
            Self::Disabled => Ok(()),
        }
    }
}
