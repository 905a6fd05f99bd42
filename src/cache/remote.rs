//! Shared remote tier.
//!
//! The store only needs `GET`, `SETEX`, `DEL`, `KEYS` and `PING`; anything
//! speaking those commands can back the remote tier. Production uses Redis
//! through a `deadpool-redis` pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as RedisPoolConfig, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use thiserror::Error;
use tracing::{info, warn};

use super::config::RemoteConfig;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote pool unavailable: {0}")]
    Pool(String),
    #[error("remote command failed: {0}")]
    Command(#[from] redis::RedisError),
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Minimal command surface of the shared cache service.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError>;

    async fn set_ex(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<(), RemoteError>;

    /// Delete `keys`, returning how many existed.
    async fn del(&self, keys: &[String]) -> Result<u64, RemoteError>;

    /// Keys matching a glob-style pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RemoteError>;

    async fn ping(&self) -> Result<(), RemoteError>;
}

/// Redis-backed remote tier.
#[derive(Clone)]
pub struct RedisRemote {
    pool: Pool,
}

impl RedisRemote {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, RemoteError> {
        self.pool
            .get()
            .await
            .map_err(|err| RemoteError::Pool(err.to_string()))
    }
}

#[async_trait]
impl RemoteStore for RedisRemote {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        let mut conn = self.connection().await?;
        Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<(), RemoteError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, RemoteError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        Ok(conn.del::<_, u64>(keys).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        let mut conn = self.connection().await?;
        Ok(conn.keys::<_, Vec<String>>(pattern).await?)
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Build the remote tier, or `None` when it is disabled or unreachable.
///
/// A missing remote store never fails startup; the cache runs local-only.
pub async fn connect(config: &RemoteConfig) -> Option<Arc<dyn RemoteStore>> {
    if !config.enabled {
        info!(tier = "remote", "remote cache disabled, using local tier only");
        return None;
    }

    let timeout = config.timeout();
    let mut pool_settings = PoolConfig::new(config.pool_size_non_zero().get());
    pool_settings.timeouts.wait = Some(timeout);
    pool_settings.timeouts.create = Some(timeout);
    pool_settings.timeouts.recycle = Some(timeout);

    let mut pool_config = RedisPoolConfig::from_url(config.url.as_str());
    pool_config.pool = Some(pool_settings);

    let pool = match pool_config.create_pool(Some(Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(err) => {
            warn!(
                tier = "remote",
                error = %err,
                "failed to create remote cache pool, using local tier only"
            );
            return None;
        }
    };

    let remote = RedisRemote::new(pool);
    match tokio::time::timeout(timeout, remote.ping()).await {
        Ok(Ok(())) => {
            info!(tier = "remote", url = %redacted_url(&config.url), "remote cache connected");
            Some(Arc::new(remote))
        }
        Ok(Err(err)) => {
            warn!(
                tier = "remote",
                error = %err,
                "remote cache unreachable, using local tier only"
            );
            None
        }
        Err(_) => {
            warn!(
                tier = "remote",
                timeout_ms = timeout.as_millis() as u64,
                "remote cache ping timed out, using local tier only"
            );
            None
        }
    }
}

/// Strip credentials from a connection URL before logging it.
fn redacted_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Escape glob metacharacters so `prefix` matches literally in `KEYS`.
pub(crate) fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
