use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

pub const PLANS_CACHE_KEY: &str = "streaming:plans:active";

pub struct RedisHelper {
    client: redis::Client,
    default_ttl: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RedisError {
    #[error("Redis connection error: {0}")]
    ConnectionError(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Key not found")]
    KeyNotFound,
}

impl RedisHelper {
    pub fn new(client: redis::Client, default_ttl: Duration) -> Self {
        Self {
            client,
            default_ttl,
        }
    }

    async fn get_conn(&self) -> Result<redis::aio::Connection, RedisError> {
        self.client
            .get_async_connection()
            .await
            .map_err(RedisError::ConnectionError)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, RedisError> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;
        match value {
            Some(v) => Ok(serde_json::from_str(&v)?),
            None => Err(RedisError::KeyNotFound),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        expiry: Option<Duration>,
    ) -> Result<(), RedisError> {
        let mut conn = self.get_conn().await?;
        let serialized = serde_json::to_string(value)?;
        let expiry = expiry.unwrap_or(self.default_ttl);
        conn.set_ex::<_, _, ()>(key, serialized, expiry.as_secs() as usize)
            .await?;
        Ok(())
    }

    /// Read-through lookup. Cache failures are logged and never surface to the
    /// caller; `load` is the source of truth.
    pub async fn get_or_load<T, F, Fut, E>(&self, key: &str, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(cached) => {
                tracing::debug!(cache.key = key, "cache hit");
                return Ok(cached);
            }
            Err(RedisError::KeyNotFound) => {
                tracing::debug!(cache.key = key, "cache miss");
            }
            Err(e) => {
                tracing::warn!(cache.key = key, error = %e, "cache unavailable, reading through");
            }
        }

        let value = load().await?;
        if let Err(e) = self.set(key, &value, None).await {
            tracing::warn!(cache.key = key, error = %e, "failed to populate cache");
        }
        Ok(value)
    }
}
