//! Injectable memoizing cache for session-scoped lookups.
//!
//! Memoizes the first successful fetch for the lifetime of the cache
//! object and supports forced reset (logout, tenant switch, tests). An
//! explicit instance instead of module-level mutable state: every consumer
//! owns (or shares) its cache, so tests are isolated and several tenants
//! can coexist in one process.
//!
//! Holding the internal lock across the fetch future also deduplicates
//! concurrent first calls — the losers wait and then read the memoized
//! value instead of issuing their own fetch.

use std::future::Future;

use tokio::sync::Mutex;

/// Memoize-first-success cache with forced invalidation.
#[derive(Debug, Default)]
pub struct SessionCache<V> {
    slot: Mutex<Option<V>>,
}

impl<V: Clone> SessionCache<V> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the cached value, or run `fetch` and memoize its success.
    /// Errors are returned to the caller and NOT cached — the next call
    /// retries.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = fetch().await?;
        *slot = Some(value.clone());
        Ok(value)
    }

    /// Drop the memoized value; the next `get_or_fetch` fetches again.
    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    /// Peek without fetching.
    pub async fn peek(&self) -> Option<V> {
        self.slot.lock().await.clone()
    }
}

// ===================================================================
// Tests
// ===================================================================
