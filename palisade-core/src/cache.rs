//! Failure counter cache.
//!
//! The cache holds a time-bounded projection of the attempt ledger: for each
//! IP address and account, the number of failures since the last success. It
//! exists purely to avoid a ledger query on every authentication attempt and
//! is never authoritative. A missing or expired entry is recomputed from the
//! ledger by the caller.
//!
//! # Example
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use std::time::Duration;
//! use palisade_core::cache::{FailureCounterCache, InMemoryFailureCache};
//! use palisade_core::storage::FailureKey;
//!
//! let cache = InMemoryFailureCache::new(Duration::from_secs(30));
//! let key = FailureKey::ip("203.0.113.7");
//!
//! assert_eq!(cache.get(&key).await, None);
//! assert_eq!(cache.increment(&key).await, 1);
//! assert_eq!(cache.increment(&key).await, 2);
//! cache.set(&key, 0).await;
//! assert_eq!(cache.get(&key).await, Some(0));
//! # }
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::storage::FailureKey;

/// Storage-agnostic counter capability used by the guard.
///
/// Implementations may be in-process maps or external cache services.
/// Operations are infallible: a cache that cannot answer must behave as if
/// the entry were missing, which makes the guard fall back to the ledger.
#[async_trait]
pub trait FailureCounterCache: Send + Sync + 'static {
    /// Current count, or `None` when the entry is cold or expired.
    async fn get(&self, key: &FailureKey) -> Option<u32>;

    /// Overwrite the count and refresh its lifetime.
    async fn set(&self, key: &FailureKey, count: u32);

    /// Store `count` only if the entry is missing or expired.
    ///
    /// Used to write back a ledger-derived count. A live entry already holds
    /// every increment applied since it was seeded and is kept as is.
    /// Returns the value held after the call.
    async fn seed(&self, key: &FailureKey, count: u32) -> u32;

    /// Atomically add one to a live entry, or seed a missing one at 1.
    ///
    /// A missing key cannot be told apart from an expired one, so an
    /// increment never fails: the in-flight failure must still be counted.
    /// Incrementing a live entry keeps its lifetime, so every entry is
    /// rederived from the ledger at least once per idle TTL.
    /// Returns the new value.
    async fn increment(&self, key: &FailureKey) -> u32;

    /// Drop a single entry.
    async fn remove(&self, key: &FailureKey);

    /// Drop every entry.
    async fn clear(&self);

    /// Number of entries currently held, expired ones included.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    count: u32,
    written_at: Instant,
}

impl CachedCount {
    fn fresh(count: u32) -> Self {
        Self {
            count,
            written_at: Instant::now(),
        }
    }

    fn is_expired(&self, idle_ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.written_at) >= idle_ttl
    }
}

/// Process-local cache backed by a sharded concurrent map.
///
/// Entries expire `idle_ttl` after they were last set or seeded; increments
/// do not extend their lifetime. Expiry is checked lazily on access; [`InMemoryFailureCache::purge_expired`] and the
/// optional eviction task only reclaim memory.
///
/// # Thread Safety
///
/// Read-modify-write operations run under the shard lock of the underlying
/// `DashMap` entry, so concurrent increments of the same key are never lost.
#[derive(Debug)]
pub struct InMemoryFailureCache {
    entries: DashMap<FailureKey, CachedCount>,
    idle_ttl: Duration,
}

impl InMemoryFailureCache {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired(self.idle_ttl, now));
        before.saturating_sub(self.entries.len())
    }

    /// Start a background task that periodically purges expired entries.
    ///
    /// The sweep is best effort and gives no deadline guarantee; correctness
    /// never depends on it because every read checks expiry itself.
    ///
    /// # Arguments
    ///
    /// * `every` - Interval between sweeps
    /// * `shutdown` - A watch receiver that signals when to stop the task
    pub fn start_eviction_task(
        self: &std::sync::Arc<Self>,
        every: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let cache = std::sync::Arc::clone(self);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(every);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "Evicted expired failure counters");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down failure counter eviction task");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl FailureCounterCache for InMemoryFailureCache {
    async fn get(&self, key: &FailureKey) -> Option<u32> {
        let now = Instant::now();
        let entry = *self.entries.get(key)?;
        if entry.is_expired(self.idle_ttl, now) {
            // Only evict if nobody refreshed it in the meantime.
            self.entries
                .remove_if(key, |_, current| current.is_expired(self.idle_ttl, now));
            return None;
        }
        Some(entry.count)
    }

    async fn set(&self, key: &FailureKey, count: u32) {
        self.entries.insert(key.clone(), CachedCount::fresh(count));
    }

    async fn seed(&self, key: &FailureKey, count: u32) -> u32 {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CachedCount::fresh(count));

        if entry.is_expired(self.idle_ttl, now) {
            *entry = CachedCount::fresh(count);
        }
        entry.count
    }

    async fn increment(&self, key: &FailureKey) -> u32 {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CachedCount::fresh(0));

        if entry.is_expired(self.idle_ttl, now) {
            *entry = CachedCount::fresh(1);
        } else {
            entry.count = entry.count.saturating_add(1);
        }
        entry.count
    }

    async fn remove(&self, key: &FailureKey) {
        self.entries.remove(key);
    }

    async fn clear(&self) {
        self.entries.clear();
    }

    async fn len(&self) -> usize {
        self.entries.len()
    }
}
