//! Single-flight request coalescing.
//!
//! Concurrent callers asking for the same key share one execution of the
//! underlying computation and all observe its result or its error. Failures
//! are not remembered: the next call after a settled failure starts a fresh
//! attempt.
//!
//! Each registered flight carries a generation number. Only the waiter that
//! observed a flight settle removes it, and only while the registry still
//! holds that generation, so a late cleanup cannot remove a newer flight for
//! the same key.
//!
//! Callers that go away do not cancel the computation while other callers
//! still wait on it. When the last waiter leaves before the flight settles,
//! the flight is dropped.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::{counter, histogram};
use tracing::debug;

use crate::cache::lock::lock_or_recover;

const SOURCE: &str = "coalesce";
pub(crate) const METRIC_JOINED: &str = "catalog_cache_coalesce_joined_total";
pub(crate) const METRIC_COMPUTE_MS: &str = "catalog_cache_compute_ms";

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E> {
    generation: u64,
    flight: Flight<T, E>,
    waiters: usize,
}

/// Deduplicates concurrent computations per key.
pub struct Coalescer<T, E> {
    flights: Mutex<HashMap<String, InFlight<T, E>>>,
    next_generation: AtomicU64,
}

impl<T, E> Coalescer<T, E> {
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Number of keys with a computation currently registered.
    pub fn in_flight(&self) -> usize {
        lock_or_recover(&self.flights, SOURCE, "in_flight").len()
    }
}

impl<T, E> Default for Coalescer<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Run `compute` for `key` unless a computation for `key` is already in
    /// flight, in which case wait for that one instead.
    pub async fn coalesce<F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (flight, mut waiter) = self.join(key, compute);
        let result = flight.await;
        waiter.settled = true;
        result
    }

    fn join<F, Fut>(&self, key: &str, compute: F) -> (Flight<T, E>, Waiter<'_, T, E>)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut flights = lock_or_recover(&self.flights, SOURCE, "join");

        if let Some(existing) = flights.get_mut(key) {
            existing.waiters += 1;
            counter!(METRIC_JOINED).increment(1);
            debug!(op = "coalesce", key, waiters = existing.waiters, "joined in-flight computation");
            return (
                existing.flight.clone(),
                Waiter::new(self, key, existing.generation),
            );
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let owned_key = key.to_string();
        let flight = async move {
            let started_at = Instant::now();
            let result = compute().await;
            histogram!(METRIC_COMPUTE_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
            debug!(
                op = "coalesce",
                key = %owned_key,
                ok = result.is_ok(),
                "computation settled"
            );
            result
        }
        .boxed()
        .shared();

        flights.insert(
            key.to_string(),
            InFlight {
                generation,
                flight: flight.clone(),
                waiters: 1,
            },
        );
        debug!(op = "coalesce", key, generation, "registered computation");
        (flight, Waiter::new(self, key, generation))
    }
}

/// One caller's interest in a flight; releases it on drop.
struct Waiter<'a, T, E> {
    coalescer: &'a Coalescer<T, E>,
    key: String,
    generation: u64,
    settled: bool,
}

impl<'a, T, E> Waiter<'a, T, E> {
    fn new(coalescer: &'a Coalescer<T, E>, key: &str, generation: u64) -> Self {
        Self {
            coalescer,
            key: key.to_string(),
            generation,
            settled: false,
        }
    }
}

impl<T, E> Drop for Waiter<'_, T, E> {
    fn drop(&mut self) {
        let mut flights = lock_or_recover(&self.coalescer.flights, SOURCE, "release");
        let Some(entry) = flights.get_mut(&self.key) else {
            return;
        };
        if entry.generation != self.generation {
            return;
        }

        if !self.settled {
            entry.waiters -= 1;
            if entry.waiters > 0 {
                return;
            }
            debug!(op = "coalesce", key = %self.key, "last waiter left, dropping computation");
        }

        let removed = flights.remove(&self.key);
        drop(flights);
        // Dropping the last handle may drop the computation; do it unlocked.
        drop(removed);
    }
}
