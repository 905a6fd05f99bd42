//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{
    CliArgs, Command, FingerprintArgs, GlobalOverrides, InvalidateArgs, KeyArgs, SetArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "catalog-cache";
const ENV_PREFIX: &str = "CATALOG_CACHE";
const DEFAULT_LOCAL_CAPACITY: u64 = 1000;
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_KEY_PREFIX: &str = "library_cache:";
const DEFAULT_REMOTE_URL: &str = "redis://localhost:6379/0";
const DEFAULT_REMOTE_POOL_SIZE: u64 = 8;
const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 1000;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub local_capacity: NonZeroUsize,
    pub default_ttl: Duration,
    pub key_prefix: String,
    pub remote: RemoteSettings,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub enabled: bool,
    pub url: String,
    pub pool_size: NonZeroUsize,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(url) = overrides.redis_url.as_ref() {
            self.cache.remote.url = Some(url.clone());
        }
        if overrides.no_remote {
            self.cache.remote.enabled = Some(false);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cache } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self { logging, cache })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let local_capacity = non_zero_usize(
        cache.local_capacity.unwrap_or(DEFAULT_LOCAL_CAPACITY),
        "cache.local_capacity",
    )?;

    let ttl_seconds = cache.default_ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let key_prefix = cache
        .key_prefix
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
    if key_prefix.contains(char::is_whitespace) {
        return Err(LoadError::invalid(
            "cache.key_prefix",
            "must not contain whitespace",
        ));
    }

    let remote = build_remote_settings(cache.remote)?;

    Ok(CacheSettings {
        local_capacity,
        default_ttl: Duration::from_secs(ttl_seconds),
        key_prefix,
        remote,
    })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let enabled = remote.enabled.unwrap_or(true);

    let url = remote
        .url
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_REMOTE_URL.to_string());
    if enabled && url.is_empty() {
        return Err(LoadError::invalid(
            "cache.remote.url",
            "must be set while the remote tier is enabled",
        ));
    }

    let pool_size = non_zero_usize(
        remote.pool_size.unwrap_or(DEFAULT_REMOTE_POOL_SIZE),
        "cache.remote.pool_size",
    )?;

    let timeout_ms = remote.timeout_ms.unwrap_or(DEFAULT_REMOTE_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.remote.timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(RemoteSettings {
        enabled,
        url,
        pool_size,
        timeout: Duration::from_millis(timeout_ms),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    local_capacity: Option<u64>,
    default_ttl_seconds: Option<u64>,
    key_prefix: Option<String>,
    remote: RawRemoteSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    enabled: Option<bool>,
    url: Option<String>,
    pool_size: Option<u64>,
    timeout_ms: Option<u64>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_usize: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value_usize)
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
