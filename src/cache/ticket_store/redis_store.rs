use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::cache::TicketStore;
use crate::errors::{Result, ViewPulseError};

pub struct RedisTicketStore {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    key_prefix: String,
}

impl RedisTicketStore {
    /// 创建客户端并 PING 一次确认可用
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            ViewPulseError::cache_connection(format!("Invalid Redis URL '{}': {}", url, e))
        })?;

        let store = Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            key_prefix: key_prefix.to_string(),
        };

        let mut conn = store.get_connection().await.map_err(|e| {
            error!("Failed to connect to Redis server at {}: {}", url, e);
            ViewPulseError::cache_connection(format!("Redis connection failed: {}", e))
        })?;
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(
            "RedisTicketStore connected ({}), prefix: '{}'",
            response, key_prefix
        );

        Ok(store)
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> std::result::Result<MultiplexedConnection, redis::RedisError> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl TicketStore for RedisTicketStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        let redis_key = self.make_key(key);
        let ttl_ms = (ttl.as_millis() as u64).max(1);

        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.reset_connection().await;
                return Err(ViewPulseError::cache_connection(format!(
                    "Failed to get Redis connection: {}",
                    e
                )));
            }
        };

        // SET key 1 NX PX ttl：成功返回 OK，已存在返回 nil
        let result: redis::RedisResult<Option<String>> = redis::cmd("SET")
            .arg(&redis_key)
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(reply) => Ok(reply.is_some()),
            Err(e) => {
                error!("SET NX failed for key '{}': {}", key, e);
                if e.is_connection_dropped() || e.is_io_error() {
                    self.reset_connection().await;
                }
                Err(e.into())
            }
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        let redis_key = self.make_key(key);
        let mut conn = match self.get_connection().await {
            Ok(c) => c,
            Err(e) => {
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        let result: redis::RedisResult<()> = conn.del(&redis_key).await;
        if let Err(e) = result {
            error!("Failed to release ticket '{}': {}", key, e);
            self.reset_connection().await;
            return Err(e.into());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
