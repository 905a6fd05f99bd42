#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use catalog_cache::cache::{CacheConfig, RemoteConfig, RemoteError, RemoteStore, TieredCache};

/// In-memory stand-in for the shared Redis tier. Several stores may share
/// one instance to model separate service processes.
#[derive(Default)]
pub struct SharedRemote {
    entries: Mutex<HashMap<String, (Vec<u8>, u64)>>,
    down: AtomicBool,
    pub calls: AtomicUsize,
}

impl SharedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn stored_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
    }

    fn check(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            Err(RemoteError::unavailable("connection reset by peer"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for SharedRemote {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<(), RemoteError> {
        self.check()?;
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_vec(), ttl_seconds));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, RemoteError> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        Ok(keys.iter().filter(|key| entries.remove(*key).is_some()).count() as u64)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, RemoteError> {
        self.check()?;
        let prefix = literal_prefix(pattern);
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RemoteError> {
        self.check()
    }
}

/// Literal prefix of an escaped glob ending in `*`.
fn literal_prefix(pattern: &str) -> String {
    let body = pattern.strip_suffix('*').unwrap_or(pattern);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.extend(chars.next()),
            other => out.push(other),
        }
    }
    out
}

pub fn config_with_capacity(local_capacity: usize) -> CacheConfig {
    CacheConfig {
        local_capacity,
        remote: RemoteConfig {
            timeout_ms: 200,
            ..RemoteConfig::default()
        },
        ..CacheConfig::default()
    }
}

pub fn store_on(remote: &Arc<SharedRemote>) -> TieredCache {
    TieredCache::new(
        &config_with_capacity(1000),
        Some(remote.clone() as Arc<dyn RemoteStore>),
    )
}
