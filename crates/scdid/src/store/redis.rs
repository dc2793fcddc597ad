use redis::{Client, aio::ConnectionManager};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{CounterStore, StoreError};

/// A [`CounterStore`] backed by Redis `INCRBY` and `EXPIRE`.
///
/// Uses a [`ConnectionManager`], which multiplexes one connection and
/// reconnects automatically, so the store is cheap to clone and share.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
}

impl RedisCounterStore {
    /// Opens a managed connection to `url` (for example
    /// `redis://127.0.0.1:6379/0`).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl CounterStore for RedisCounterStore {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    async fn increment_by(&self, key: &str, delta: u64) -> Result<u64, StoreError> {
        let mut conn = self.conn.clone();
        let value: u64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    async fn set_ttl(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn validate(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
