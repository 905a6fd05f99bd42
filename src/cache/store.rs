//! Two-tier cache store.
//!
//! Reads go to the shared remote tier first and fall back to the bounded local
//! tier. Writes go to both. Remote faults are logged and treated as misses;
//! they never reach callers.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::codec::{CachedValue, CodecError};
use super::config::CacheConfig;
use super::local::{BoundedLocalCache, LocalLookup};
use super::lock::lock_or_recover;
use super::remote::{self, RemoteError, RemoteStore, escape_glob};
use super::stats::{CacheCounters, CacheStats, METRIC_LOCAL_EVICT, METRIC_REMOTE_ERROR};

const SOURCE: &str = "cache::store";

/// Remote + local cache with TTL expiry and prefix invalidation.
///
/// Build one per process at the application root and share it through an
/// `Arc`.
pub struct TieredCache {
    remote: Option<Arc<dyn RemoteStore>>,
    local: Mutex<BoundedLocalCache>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
    remote_timeout: Duration,
    default_ttl: Duration,
    counters: CacheCounters,
}

impl TieredCache {
    pub fn new(config: &CacheConfig, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        Self::with_clock(config, remote, Arc::new(SystemClock))
    }

    /// Store using an explicit time source for expiry decisions.
    pub fn with_clock(
        config: &CacheConfig,
        remote: Option<Arc<dyn RemoteStore>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            remote,
            local: Mutex::new(BoundedLocalCache::new(config.local_capacity_non_zero())),
            clock,
            key_prefix: config.key_prefix.clone(),
            remote_timeout: config.remote.timeout(),
            default_ttl: config.default_ttl(),
            counters: CacheCounters::default(),
        }
    }

    /// Store without a remote tier.
    pub fn local_only(config: &CacheConfig) -> Self {
        Self::new(config, None)
    }

    /// Connect the remote tier described by `config`, degrading to local-only
    /// when it is disabled or unreachable.
    pub async fn connect(config: &CacheConfig) -> Self {
        let remote = remote::connect(&config.remote).await;
        Self::new(config, remote)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        self.counters.operation();

        if let Some(remote) = &self.remote {
            let remote_key = self.remote_key(key);
            if let Some(Some(data)) = self.remote_call("get", key, remote.get(&remote_key)).await {
                match CachedValue::from_bytes(&data) {
                    Ok(value) => {
                        self.counters.remote_hit();
                        debug!(op = "get", key, tier = "remote", result = "hit");
                        return Some(value);
                    }
                    Err(err) => {
                        warn!(
                            op = "get",
                            key,
                            tier = "remote",
                            error = %err,
                            "discarding undecodable remote entry"
                        );
                    }
                }
            }
        }

        let now = self.clock.now();
        let lookup = lock_or_recover(&self.local, SOURCE, "get").get(key, now);
        match lookup {
            LocalLookup::Hit(value) => {
                self.counters.local_hit();
                debug!(op = "get", key, tier = "local", result = "hit");
                Some(value)
            }
            LocalLookup::Expired => {
                self.counters.miss();
                debug!(op = "get", key, tier = "local", result = "expired");
                None
            }
            LocalLookup::Missing => {
                self.counters.miss();
                debug!(op = "get", key, result = "miss");
                None
            }
        }
    }

    /// Fetch and decode a typed value. Undecodable entries read as a miss.
    pub async fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match value.deserialize() {
            Ok(typed) => Some(typed),
            Err(err) => {
                warn!(op = "get_typed", key, error = %err, "cached value has unexpected shape");
                None
            }
        }
    }

    /// Write to both tiers. Returns `true` once the local tier holds the value.
    ///
    /// A zero `ttl` stores nothing and returns `false`.
    pub async fn set(&self, key: &str, value: impl Into<CachedValue>, ttl: Duration) -> bool {
        self.counters.operation();
        let value = value.into();

        if ttl.is_zero() {
            debug!(op = "set", key, result = "skipped", "ignoring write with zero ttl");
            return false;
        }

        if let Some(remote) = &self.remote {
            match value.to_bytes() {
                Ok(bytes) => {
                    let remote_key = self.remote_key(key);
                    self.remote_call(
                        "set",
                        key,
                        remote.set_ex(&remote_key, &bytes, whole_seconds(ttl)),
                    )
                    .await;
                }
                Err(err) => {
                    warn!(op = "set", key, tier = "remote", error = %err, "skipping remote write");
                }
            }
        }

        let now = self.clock.now();
        let evicted = lock_or_recover(&self.local, SOURCE, "set").insert(
            key.to_string(),
            value,
            now + ttl,
            now,
        );
        if evicted > 0 {
            counter!(METRIC_LOCAL_EVICT).increment(evicted as u64);
            debug!(op = "set", key, tier = "local", evicted, "local tier at capacity");
        }
        true
    }

    /// Encode and store a typed value.
    ///
    /// Fails only when the value can be encoded neither as JSON nor as
    /// MessagePack.
    pub async fn set_typed<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<bool, CodecError> {
        let value = CachedValue::from_serialize(value)?;
        Ok(self.set(key, value, ttl).await)
    }

    /// Remove `key` from both tiers. Returns whether either tier held it.
    pub async fn delete(&self, key: &str) -> bool {
        self.counters.operation();

        let mut existed = false;
        if let Some(remote) = &self.remote {
            let remote_key = self.remote_key(key);
            existed = self
                .remote_call("delete", key, remote.del(&[remote_key]))
                .await
                .is_some_and(|count| count > 0);
        }

        let now = self.clock.now();
        let local_existed = lock_or_recover(&self.local, SOURCE, "delete").remove(key, now);
        existed || local_existed
    }

    /// Remove every key starting with `pattern` from both tiers.
    ///
    /// `*` characters are ignored, so `books:*` and `books:` are equivalent.
    /// Returns the number of distinct keys removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        self.counters.operation();
        let prefix = pattern.replace('*', "");

        let mut removed: HashSet<String> = HashSet::new();
        if let Some(remote) = &self.remote {
            let glob = format!("{}{}*", escape_glob(&self.key_prefix), escape_glob(&prefix));
            if let Some(keys) = self
                .remote_call("invalidate_pattern", &prefix, remote.keys(&glob))
                .await
            {
                let deleted = keys.is_empty()
                    || self
                        .remote_call("invalidate_pattern", &prefix, remote.del(&keys))
                        .await
                        .is_some();
                if deleted {
                    removed.extend(
                        keys.iter()
                            .filter_map(|key| key.strip_prefix(self.key_prefix.as_str()))
                            .map(str::to_string),
                    );
                }
            }
        }

        let now = self.clock.now();
        removed.extend(
            lock_or_recover(&self.local, SOURCE, "invalidate_pattern").remove_prefix(&prefix, now),
        );

        info!(
            op = "invalidate_pattern",
            prefix = %prefix,
            removed = removed.len(),
            "invalidated cache keys"
        );
        removed.len()
    }

    /// Drop every entry this store owns in both tiers.
    ///
    /// Returns whether the remote tier was cleared; the local tier always is.
    pub async fn clear(&self) -> bool {
        self.counters.operation();

        let mut remote_cleared = false;
        if let Some(remote) = &self.remote {
            let glob = format!("{}*", escape_glob(&self.key_prefix));
            if let Some(keys) = self.remote_call("clear", "*", remote.keys(&glob)).await {
                remote_cleared = keys.is_empty()
                    || self
                        .remote_call("clear", "*", remote.del(&keys))
                        .await
                        .is_some();
            }
        }

        lock_or_recover(&self.local, SOURCE, "clear").clear();
        info!(op = "clear", remote_cleared, "cache cleared");
        remote_cleared
    }

    pub fn stats(&self) -> CacheStats {
        let local_entries = self.local_len();
        self.counters
            .snapshot(self.remote.is_some(), local_entries)
    }

    /// Entries currently held by the local tier, expired ones included until
    /// they are touched.
    pub fn local_len(&self) -> usize {
        lock_or_recover(&self.local, SOURCE, "local_len").len()
    }

    /// Whether the remote tier answers a ping right now.
    pub async fn is_remote_available(&self) -> bool {
        match &self.remote {
            Some(remote) => self.remote_call("ping", "", remote.ping()).await.is_some(),
            None => false,
        }
    }

    fn remote_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Run one remote command under the per-call timeout, logging failures.
    async fn remote_call<T>(
        &self,
        op: &'static str,
        key: &str,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Option<T> {
        let err = match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(err)) => err,
            Err(_) => RemoteError::Timeout(self.remote_timeout),
        };

        counter!(METRIC_REMOTE_ERROR).increment(1);
        warn!(op, key, tier = "remote", error = %err, "remote cache call failed");
        None
    }
}

/// TTL in whole seconds for `SETEX`, rounded up and never zero.
fn whole_seconds(ttl: Duration) -> u64 {
    let rounded = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    rounded.max(1)
}
