//! Redis cursor cache implementation

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use sysadm_core::config::CacheConfig;
use sysadm_core::{CursorCache, DispatchError, DispatchResult};
use tracing::{debug, error, info, instrument};

/// Redis-backed cursor cache sharing one multiplexed connection manager
#[derive(Clone)]
pub struct RedisCursorCache {
    conn: ConnectionManager,
}

impl RedisCursorCache {
    /// Connect and verify the server answers PING
    pub async fn new(config: &CacheConfig) -> DispatchResult<Self> {
        if !config.enabled {
            return Err(DispatchError::Configuration(
                "Cache is disabled".to_string(),
            ));
        }

        info!("Creating Redis cursor cache with URL: {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.clone())
            .map_err(|e| DispatchError::CacheError(e.to_string()))?;

        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let mut conn = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| DispatchError::CacheError("Redis connection timed out".to_string()))?
            .map_err(|e| DispatchError::CacheError(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DispatchError::CacheError(e.to_string()))?;

        info!("Redis cursor cache created successfully");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CursorCache for RedisCursorCache {
    #[instrument(skip(self))]
    async fn exists(&self, key: &str) -> DispatchResult<bool> {
        let mut conn = self.conn.clone();
        let result: i32 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Cache EXISTS failed for key {}: {}", key, e);
                DispatchError::CacheError(e.to_string())
            })?;

        Ok(result > 0)
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> DispatchResult<Option<String>> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Cache GET failed for key {}: {}", key, e);
                DispatchError::CacheError(e.to_string())
            })?;

        debug!("Cache GET {}: {}", key, if result.is_some() { "hit" } else { "miss" });
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn set(&self, key: &str, value: &str) -> DispatchResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Cache SET failed for key {}: {}", key, e);
                DispatchError::CacheError(e.to_string())
            })?;

        debug!("Cache SET success: {}", key);
        Ok(())
    }
}
