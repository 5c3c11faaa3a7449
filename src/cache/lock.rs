//! Poison-tolerant lock helpers.
//!
//! A panic while holding a cache lock must not wedge every later request.
//! Cached state is rebuildable, so recovering the guard from a poisoned
//! mutex is safe here.

use std::sync::{Mutex, MutexGuard};

pub fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("cache mutex poisoned, recovering guard");
            poisoned.into_inner()
        }
    }
}
