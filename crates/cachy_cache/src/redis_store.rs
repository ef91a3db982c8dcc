use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::RedisResult;
use redis::aio::ConnectionManager;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::{CacheStore, StoreError};

/// Redis-backed store.
///
/// Uses a `ConnectionManager`: one multiplexed connection shared by every
/// request, re-established in the background after a failure. Each command
/// is bounded by `op_timeout`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    addr: String,
    op_timeout: Duration,
}

impl RedisStore {
    /// Connects to `addr` (`host:port` or a full `redis://` URL).
    #[instrument(skip(op_timeout))]
    pub async fn connect(addr: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let url = redis_url(addr);
        let client = redis::Client::open(url.as_str())?;

        let conn = timeout(op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                op: "connect",
                after: op_timeout,
            })??;

        info!(target: "cachy::store", store = %addr, "Connected to redis");

        Ok(Self {
            conn,
            addr: addr.to_string(),
            op_timeout,
        })
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(StoreError::Timeout {
                op,
                after: self.op_timeout,
            }),
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = self
            .bounded("GET", async move {
                redis::cmd("GET").arg(key).query_async(&mut conn).await
            })
            .await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let ttl_ms = ttl_millis(ttl);
        let mut conn = self.conn.clone();
        let _: () = self
            .bounded("SET", async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value.as_ref())
                    .arg("PX")
                    .arg(ttl_ms)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        debug!(target: "cachy::store", %key, ttl_ms, "SET ok");
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = self
            .bounded("FLUSHALL", async move {
                redis::cmd("FLUSHALL").query_async(&mut conn).await
            })
            .await?;
        debug!(target: "cachy::store", store = %self.addr, "FLUSHALL ok");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let pong: String = self
            .bounded("PING", async move {
                redis::cmd("PING").query_async(&mut conn).await
            })
            .await?;
        debug!(target: "cachy::store", reply = %pong, "PING ok");
        Ok(())
    }
}

/// `PX` argument for `ttl`. Redis rejects `PX 0`, so sub-millisecond TTLs
/// round up; TTLs beyond `u64` milliseconds saturate.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn redis_url(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{addr}/")
    }
}
