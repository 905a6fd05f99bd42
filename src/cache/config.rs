//! Cache configuration.
//!
//! Controls the local tier bounds, default TTL and the remote connection via
//! the `[cache]` section of `catalog-cache.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_LOCAL_CAPACITY: usize = 1000;
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_KEY_PREFIX: &str = "library_cache:";
const DEFAULT_REMOTE_URL: &str = "redis://localhost:6379/0";
const DEFAULT_REMOTE_POOL_SIZE: usize = 8;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 1000;

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries held by the local tier.
    pub local_capacity: usize,
    /// TTL applied by callers that do not choose one.
    pub default_ttl_seconds: u64,
    /// Namespace prepended to every key in the remote tier.
    pub key_prefix: String,
    /// Remote tier connection.
    pub remote: RemoteConfig,
}

/// Remote tier connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Connect to the remote tier at all.
    pub enabled: bool,
    /// Redis connection URL.
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Per-call timeout (ms) for every remote command.
    pub timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: DEFAULT_LOCAL_CAPACITY,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_REMOTE_URL.to_string(),
            pool_size: DEFAULT_REMOTE_POOL_SIZE,
            timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            local_capacity: settings.local_capacity.get(),
            default_ttl_seconds: settings.default_ttl.as_secs(),
            key_prefix: settings.key_prefix.clone(),
            remote: RemoteConfig {
                enabled: settings.remote.enabled,
                url: settings.remote.url.clone(),
                pool_size: settings.remote.pool_size.get(),
                timeout_ms: u64::try_from(settings.remote.timeout.as_millis()).unwrap_or(u64::MAX),
            },
        }
    }
}

impl CacheConfig {
    /// Returns the local capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn local_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.local_capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the default TTL, clamping to one second if zero.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds.max(1))
    }
}

impl RemoteConfig {
    /// Returns the pool size as NonZeroUsize, clamping to 1 if zero.
    pub fn pool_size_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.pool_size).unwrap_or(NonZeroUsize::MIN)
    }

    /// Per-call timeout, clamped to at least one millisecond.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.local_capacity, 1000);
        assert_eq!(config.default_ttl_seconds, 300);
        assert_eq!(config.key_prefix, "library_cache:");
        assert!(config.remote.enabled);
        assert_eq!(config.remote.url, "redis://localhost:6379/0");
        assert_eq!(config.remote.pool_size, 8);
        assert_eq!(config.remote.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            local_capacity: 0,
            default_ttl_seconds: 0,
            remote: RemoteConfig {
                pool_size: 0,
                timeout_ms: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.local_capacity_non_zero().get(), 1);
        assert_eq!(config.default_ttl(), Duration::from_secs(1));
        assert_eq!(config.remote.pool_size_non_zero().get(), 1);
        assert_eq!(config.remote.timeout(), Duration::from_millis(1));
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"local_capacity": 50, "remote": {"enabled": false}}"#)
                .expect("valid cache config");
        assert_eq!(config.local_capacity, 50);
        assert!(!config.remote.enabled);
        assert_eq!(config.remote.timeout_ms, 1000);
        assert_eq!(config.key_prefix, "library_cache:");
    }
}
