//! Cache-accelerated failure counters.
//!
//! [`FailureCounterService`] answers "how many failures since the last
//! success" for an IP address or account. The cache is consulted first; a
//! cold key is derived from the ledger and written back. After an attempt has
//! been durably appended, [`FailureCounterService::record`] applies the same
//! outcome to the cached counters incrementally.

use std::sync::Arc;

use crate::{
    Error, UserId,
    cache::FailureCounterCache,
    repositories::LoginAttemptRepository,
    storage::{FailureKey, KeyKind},
};

/// Keeps the failure counter cache consistent with the ledger.
///
/// # Thread Safety
///
/// The service holds no state of its own. Concurrent attempts for the same key
/// rely on the cache's atomic increment. A ledger-derived count is written back
/// with [`FailureCounterCache::seed`], so a slow derivation never replaces an
/// entry another attempt has already seeded and incremented. The remaining
/// window, an entry expiring between an append and its increment, can only
/// overcount, and lasts until the entry's idle TTL runs out.
pub struct FailureCounterService<L: LoginAttemptRepository, C: FailureCounterCache> {
    ledger: Arc<L>,
    cache: Arc<C>,
}

impl<L: LoginAttemptRepository, C: FailureCounterCache> FailureCounterService<L, C> {
    pub fn new(ledger: Arc<L>, cache: Arc<C>) -> Self {
        Self { ledger, cache }
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Current failure count for `key`, deriving it from the ledger on a miss.
    pub async fn current(&self, key: &FailureKey) -> Result<u32, Error> {
        if let Some(count) = self.cache.get(key).await {
            return Ok(count);
        }

        let derived = self.ledger.count_failures_since_last_success(key).await?;
        let count = self.cache.seed(key, derived).await;
        tracing::debug!(key = %key, derived, count, "Derived failure count from ledger");
        Ok(count)
    }

    /// Apply an appended attempt to the cached counters.
    ///
    /// A success resets both counters to zero. A failure increments the IP
    /// counter and, when the login resolved to an account, the user counter.
    /// Must only be called after the attempt is durably in the ledger.
    pub async fn record(&self, ip: &str, user_id: Option<UserId>, succeeded: bool) {
        let ip_key = FailureKey::ip(ip);
        let user_key = user_id.map(FailureKey::user);

        if succeeded {
            self.cache.set(&ip_key, 0).await;
            if let Some(key) = &user_key {
                self.cache.set(key, 0).await;
            }
            return;
        }

        self.cache.increment(&ip_key).await;
        if let Some(key) = &user_key {
            self.cache.increment(key).await;
        }
    }

    /// Replace the cache contents with counts derived from the ledger.
    ///
    /// Every IP present in the ledger is seeded, zero counts included. User
    /// counters are seeded only when `include_users` is set and are otherwise
    /// left to lazy population. The ledger is read before the cache is cleared,
    /// so a ledger failure leaves the cache untouched.
    ///
    /// # Returns
    ///
    /// The number of counters seeded.
    pub async fn warm_start(&self, include_users: bool) -> Result<usize, Error> {
        let mut windows = self.ledger.failure_windows(KeyKind::Ip, 0).await?;
        if include_users {
            windows.extend(self.ledger.failure_windows(KeyKind::User, 0).await?);
        }

        self.cache.clear().await;
        for window in &windows {
            self.cache.set(&window.key, window.failures).await;
        }

        tracing::info!(
            seeded = windows.len(),
            include_users,
            "Warmed failure counter cache from ledger"
        );
        Ok(windows.len())
    }

    /// Drop every cached counter without reseeding.
    pub async fn reset(&self) {
        self.cache.clear().await;
        tracing::info!("Cleared failure counter cache");
    }
}
