//! Repository trait for the login attempt ledger.

use async_trait::async_trait;

use crate::{
    Error, UserId,
    storage::{FailureKey, FailureWindow, KeyKind, LastLogin, LoginAttempt, NewLoginAttempt},
};

/// Append-only ledger of authentication attempts.
///
/// The ledger is the single source of truth for failure counts. Records are
/// ordered by their ledger-assigned `id` and are never updated or deleted.
///
/// Every "failures since last success" quantity exposed here uses the same
/// predicate: failed records for the key whose `id` is strictly greater than
/// the `id` of the most recent successful record for that key, or all failed
/// records when the key never succeeded.
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Durably record one attempt.
    ///
    /// Must not return until the record is written; callers update counters
    /// only after this succeeds.
    ///
    /// # Returns
    ///
    /// The stored record with its assigned ID and timestamp.
    async fn append(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error>;

    /// Count failures for one key since its most recent success.
    async fn count_failures_since_last_success(&self, key: &FailureKey) -> Result<u32, Error>;

    /// Compute failures since last success for every key of one kind.
    ///
    /// Only keys with at least `minimum` failures are returned; with a minimum
    /// of zero every key present in the ledger is returned. Attempts without a
    /// resolved user never appear as user keys.
    ///
    /// # Arguments
    ///
    /// * `kind` - Whether to group by IP address or by account
    /// * `minimum` - Lower bound (inclusive) on the failure count
    async fn failure_windows(
        &self,
        kind: KeyKind,
        minimum: u32,
    ) -> Result<Vec<FailureWindow>, Error>;

    /// Where and when the account last logged in before the current session.
    ///
    /// Returns the second most recent successful attempt, falling back to the
    /// most recent one when the account has succeeded only once.
    async fn last_login(&self, user_id: &UserId) -> Result<Option<LastLogin>, Error>;
}
