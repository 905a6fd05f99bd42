use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Acquire a cache mutex, recovering the guard if a previous holder panicked.
///
/// The local tier and the in-flight registry only hold plain bookkeeping
/// data, so a poisoned lock is logged and reused rather than propagated.
pub(crate) fn lock_or_recover<'a, T>(
    lock: &'a Mutex<T>,
    component: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                component,
                result = "poisoned_recovered",
                "recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}
