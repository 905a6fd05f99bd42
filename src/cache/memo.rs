//! Read-through memoization on top of the tiered store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use super::keys::namespace_pattern;
use super::store::TieredCache;
use crate::coalesce::Coalescer;

type KeyBuilder<A> = Arc<dyn Fn(&A) -> String + Send + Sync>;

/// Caches the results of one expensive operation under a namespace.
///
/// Keys are `namespace:key_builder(args)`. Misses run the computation through
/// a [`Coalescer`], so concurrent misses for the same arguments compute once
/// and the result is stored once. Failures are returned and never cached.
pub struct Memoized<A: ?Sized, T, E> {
    cache: Arc<TieredCache>,
    namespace: String,
    ttl: Duration,
    key_builder: KeyBuilder<A>,
    coalescer: Coalescer<T, E>,
}

impl<A, T, E> Memoized<A, T, E>
where
    A: ?Sized,
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(
        cache: Arc<TieredCache>,
        namespace: impl Into<String>,
        ttl: Duration,
        key_builder: impl Fn(&A) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            cache,
            namespace: namespace.into(),
            ttl,
            key_builder: Arc::new(key_builder),
            coalescer: Coalescer::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key_for(&self, args: &A) -> String {
        format!("{}:{}", self.namespace, (self.key_builder)(args))
    }

    /// Cached value for `args`, or the result of `compute` stored with the
    /// configured TTL.
    pub async fn get_or_compute<F, Fut>(&self, args: &A, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = self.key_for(args);
        if let Some(hit) = self.cache.get_typed::<T>(&key).await {
            return Ok(hit);
        }

        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let store_key = key.clone();
        self.coalescer
            .coalesce(&key, move || async move {
                let value = compute().await?;
                if let Err(err) = cache.set_typed(&store_key, &value, ttl).await {
                    warn!(op = "memoize", key = %store_key, error = %err, "result not cached");
                }
                Ok(value)
            })
            .await
    }

    /// Drop every cached result of this namespace.
    pub async fn clear(&self) -> usize {
        self.cache
            .invalidate_pattern(&namespace_pattern(&self.namespace))
            .await
    }
}
