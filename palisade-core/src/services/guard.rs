//! Brute force guard for password logins.
//!
//! Every login attempt passes through [`BruteForceGuard::attempt`], which
//! refuses banned IP addresses and locked accounts before any password is
//! hashed, records exactly one ledger entry per attempt, and keeps the
//! failure counters in step with the ledger.
//!
//! # Decision order
//!
//! 1. Resolve the login against the credential store
//! 2. IP gate: failures since last success for the IP at or above the ban threshold
//! 3. Account gate: failures since last success for the account at or above the
//!    lock threshold (resolved accounts only)
//! 4. Unknown login
//! 5. Password check
//!
//! Banned and locked attempts are recorded as failures like any other.
//!
//! # Example
//!
//! ```rust,ignore
//! use palisade_core::services::{BruteForceGuard, LoginOutcome};
//!
//! let guard = BruteForceGuard::new(credentials, ledger, cache, hasher, config);
//!
//! match guard.attempt("alice", "hunter2", "203.0.113.7").await? {
//!     LoginOutcome::Success(user) => { /* start a session */ }
//!     outcome => { /* show outcome.public_message() */ }
//! }
//! ```

use std::sync::Arc;

use crate::{
    Error, User, UserId,
    cache::FailureCounterCache,
    config::BruteForceConfig,
    crypto::PasswordHasher,
    repositories::{CredentialRepository, LoginAttemptRepository},
    services::FailureCounterService,
    storage::{FailureKey, LastLogin, NewLoginAttempt},
};

const MESSAGE_BANNED: &str = "You're banned.";
const MESSAGE_LOCKED: &str = "This account is locked.";
const MESSAGE_INVALID_CREDENTIALS: &str = "Wrong username or password";

/// Terminal result of one login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Success(User),
    /// The source IP has too many failures since its last success
    Banned,
    /// The account has too many failures since its last success
    Locked,
    NotFound,
    WrongPassword,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }

    /// Message safe to show the caller, `None` on success.
    ///
    /// Unknown logins and wrong passwords share one message so callers cannot
    /// probe which accounts exist.
    pub fn public_message(&self) -> Option<&'static str> {
        match self {
            LoginOutcome::Success(_) => None,
            LoginOutcome::Banned => Some(MESSAGE_BANNED),
            LoginOutcome::Locked => Some(MESSAGE_LOCKED),
            LoginOutcome::NotFound | LoginOutcome::WrongPassword => {
                Some(MESSAGE_INVALID_CREDENTIALS)
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            LoginOutcome::Success(_) => "success",
            LoginOutcome::Banned => "banned",
            LoginOutcome::Locked => "locked",
            LoginOutcome::NotFound => "not_found",
            LoginOutcome::WrongPassword => "wrong_password",
        }
    }
}

/// Decides whether a login attempt is allowed and records its outcome.
///
/// # Failure semantics
///
/// A credential store or ledger failure aborts the attempt with
/// [`Error::Storage`]. Nothing is appended and no counter changes; the attempt
/// is never treated as allowed.
pub struct BruteForceGuard<U, L, C>
where
    U: CredentialRepository,
    L: LoginAttemptRepository,
    C: FailureCounterCache,
{
    credentials: Arc<U>,
    ledger: Arc<L>,
    counters: FailureCounterService<L, C>,
    hasher: Arc<dyn PasswordHasher>,
    config: BruteForceConfig,
}

impl<U, L, C> BruteForceGuard<U, L, C>
where
    U: CredentialRepository,
    L: LoginAttemptRepository,
    C: FailureCounterCache,
{
    pub fn new(
        credentials: Arc<U>,
        ledger: Arc<L>,
        cache: Arc<C>,
        hasher: Arc<dyn PasswordHasher>,
        config: BruteForceConfig,
    ) -> Self {
        Self {
            credentials,
            counters: FailureCounterService::new(ledger.clone(), cache),
            ledger,
            hasher,
            config,
        }
    }

    pub fn config(&self) -> &BruteForceConfig {
        &self.config
    }

    pub fn counters(&self) -> &FailureCounterService<L, C> {
        &self.counters
    }

    /// Run one login attempt to its terminal outcome.
    ///
    /// # Arguments
    ///
    /// * `login` - The submitted login name, recorded verbatim
    /// * `password` - The submitted password
    /// * `ip` - The client address the attempt is attributed to
    pub async fn attempt(
        &self,
        login: &str,
        password: &str,
        ip: &str,
    ) -> Result<LoginOutcome, Error> {
        let user = self.credentials.find_by_login(login).await?;
        let user_id = user.as_ref().map(|u| u.id);
        let user_key = user_id.map(FailureKey::user);

        let outcome = self.decide(user, user_key.as_ref(), password, ip).await?;

        let record = match (&outcome, user_id) {
            (LoginOutcome::Success(_), Some(id)) => NewLoginAttempt::succeeded(id, login, ip),
            _ => NewLoginAttempt::failed(user_id, login, ip),
        };
        let appended = self.ledger.append(record).await?;

        self.counters
            .record(ip, user_id, appended.succeeded)
            .await;

        match &outcome {
            LoginOutcome::Banned | LoginOutcome::Locked => tracing::warn!(
                login = %login,
                ip = %ip,
                outcome = outcome.label(),
                attempt_id = appended.id,
                "Refused login attempt"
            ),
            _ => tracing::debug!(
                login = %login,
                ip = %ip,
                outcome = outcome.label(),
                attempt_id = appended.id,
                "Recorded login attempt"
            ),
        }

        Ok(outcome)
    }

    async fn decide(
        &self,
        user: Option<User>,
        user_key: Option<&FailureKey>,
        password: &str,
        ip: &str,
    ) -> Result<LoginOutcome, Error> {
        let ip_failures = self.counters.current(&FailureKey::ip(ip)).await?;
        if ip_failures >= self.config.ip_ban_threshold {
            // The account gate is skipped, but its counter is about to be
            // incremented; make sure it starts from the ledger value.
            if let Some(key) = user_key {
                self.counters.current(key).await?;
            }
            return Ok(LoginOutcome::Banned);
        }

        let (Some(user), Some(user_key)) = (user, user_key) else {
            return Ok(LoginOutcome::NotFound);
        };

        let user_failures = self.counters.current(user_key).await?;
        if user_failures >= self.config.user_lock_threshold {
            return Ok(LoginOutcome::Locked);
        }

        if !self
            .hasher
            .verify(password, &user.salt, &user.password_hash)
        {
            return Ok(LoginOutcome::WrongPassword);
        }

        Ok(LoginOutcome::Success(user))
    }

    /// Failures since last success for a key, from the cache or the ledger.
    pub async fn failure_count(&self, key: &FailureKey) -> Result<u32, Error> {
        self.counters.current(key).await
    }

    /// Reseed the cache from the ledger.
    pub async fn warm_start(&self) -> Result<usize, Error> {
        self.counters
            .warm_start(self.config.warm_user_counters)
            .await
    }

    /// Drop every cached counter.
    pub async fn reset_cache(&self) {
        self.counters.reset().await
    }

    pub async fn current_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.credentials.find_by_id(user_id).await
    }

    pub async fn last_login(&self, user_id: &UserId) -> Result<Option<LastLogin>, Error> {
        self.ledger.last_login(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryFailureCache;
    use crate::crypto::Sha256PasswordHasher;
    use crate::services::testing::{MockCredentials, MockLedger};
    use std::time::Duration;

    struct Fixture {
        credentials: Arc<MockCredentials>,
        ledger: Arc<MockLedger>,
        cache: Arc<InMemoryFailureCache>,
        guard: BruteForceGuard<MockCredentials, MockLedger, InMemoryFailureCache>,
    }

    fn fixture(config: BruteForceConfig) -> Fixture {
        let credentials = Arc::new(MockCredentials::default());
        let ledger = Arc::new(MockLedger::default());
        let cache = Arc::new(InMemoryFailureCache::new(config.cache_idle_ttl));
        let guard = BruteForceGuard::new(
            credentials.clone(),
            ledger.clone(),
            cache.clone(),
            Arc::new(Sha256PasswordHasher),
            config,
        );
        Fixture {
            credentials,
            ledger,
            cache,
            guard,
        }
    }

    #[tokio::test]
    async fn test_success() {
        let f = fixture(BruteForceConfig::default());
        let alice = f.credentials.add("alice", "hunter2");

        let outcome = f.guard.attempt("alice", "hunter2", "10.0.0.1").await.unwrap();

        assert_eq!(outcome, LoginOutcome::Success(alice.clone()));
        let records = f.ledger.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].succeeded);
        assert_eq!(records[0].user_id, Some(alice.id));
    }

    #[tokio::test]
    async fn test_wrong_password_records_user() {
        let f = fixture(BruteForceConfig::default());
        let alice = f.credentials.add("alice", "hunter2");

        let outcome = f.guard.attempt("alice", "nope", "10.0.0.1").await.unwrap();

        assert_eq!(outcome, LoginOutcome::WrongPassword);
        assert_eq!(f.cache.get(&FailureKey::user(alice.id)).await, Some(1));
        assert_eq!(f.cache.get(&FailureKey::ip("10.0.0.1")).await, Some(1));
    }

    #[tokio::test]
    async fn test_ip_ban_after_threshold() {
        let f = fixture(BruteForceConfig::default());
        f.credentials.add("alice", "hunter2");

        for i in 0..10 {
            let login = format!("nobody{i}");
            let outcome = f.guard.attempt(&login, "x", "10.0.0.1").await.unwrap();
            assert_eq!(outcome, LoginOutcome::NotFound);
        }

        let outcome = f.guard.attempt("alice", "hunter2", "10.0.0.1").await.unwrap();
        assert_eq!(outcome, LoginOutcome::Banned);
        assert_eq!(f.ledger.len(), 11);
        assert!(!f.ledger.records.lock().unwrap()[10].succeeded);
    }

    #[tokio::test]
    async fn test_banned_attempts_keep_counting() {
        let f = fixture(BruteForceConfig::default().with_ip_ban_threshold(1));
        f.guard.attempt("ghost", "x", "10.0.0.1").await.unwrap();

        for _ in 0..3 {
            let outcome = f.guard.attempt("ghost", "x", "10.0.0.1").await.unwrap();
            assert_eq!(outcome, LoginOutcome::Banned);
        }
        assert_eq!(f.cache.get(&FailureKey::ip("10.0.0.1")).await, Some(4));
    }

    #[tokio::test]
    async fn test_user_lock_from_clean_ip() {
        let f = fixture(BruteForceConfig::default());
        f.credentials.add("alice", "hunter2");

        for _ in 0..3 {
            f.guard.attempt("alice", "wrong", "10.0.0.1").await.unwrap();
        }

        let outcome = f.guard.attempt("alice", "hunter2", "10.9.9.9").await.unwrap();
        assert_eq!(outcome, LoginOutcome::Locked);
    }

    #[tokio::test]
    async fn test_locked_is_checked_before_password() {
        let f = fixture(BruteForceConfig::default().with_user_lock_threshold(1));
        f.credentials.add("alice", "hunter2");
        f.guard.attempt("alice", "wrong", "10.0.0.1").await.unwrap();

        let outcome = f.guard.attempt("alice", "wrong", "10.0.0.2").await.unwrap();
        assert_eq!(outcome, LoginOutcome::Locked);
    }

    #[tokio::test]
    async fn test_success_resets_counters() {
        let f = fixture(BruteForceConfig::default());
        let bob = f.credentials.add("bob", "pw");

        f.guard.attempt("bob", "x", "10.0.0.1").await.unwrap();
        f.guard.attempt("bob", "x", "10.0.0.1").await.unwrap();
        assert!(f.guard.attempt("bob", "pw", "10.0.0.1").await.unwrap().is_success());
        f.guard.attempt("bob", "x", "10.0.0.1").await.unwrap();

        let key = FailureKey::user(bob.id);
        assert_eq!(f.guard.failure_count(&key).await.unwrap(), 1);
        assert_eq!(
            f.ledger.count_failures_since_last_success(&key).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_login_appends_record_without_user() {
        let f = fixture(BruteForceConfig::default());

        let outcome = f.guard.attempt("ghost", "x", "10.0.0.1").await.unwrap();

        assert_eq!(outcome, LoginOutcome::NotFound);
        let records = f.ledger.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, None);
        assert_eq!(records[0].login, "ghost");
        drop(records);
        assert_eq!(f.cache.get(&FailureKey::ip("10.0.0.1")).await, Some(1));
    }

    #[tokio::test]
    async fn test_ledger_unavailable_fails_closed() {
        let f = fixture(BruteForceConfig::default());
        f.credentials.add("alice", "hunter2");
        f.ledger.set_unavailable(true);

        let err = f.guard.attempt("alice", "hunter2", "10.0.0.1").await.unwrap_err();

        assert!(err.is_storage_error());
        assert_eq!(f.ledger.len(), 0);
        assert!(f.cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_ledger_append_failure_leaves_counters() {
        let f = fixture(BruteForceConfig::default());
        f.credentials.add("alice", "hunter2");
        f.cache.set(&FailureKey::ip("10.0.0.1"), 2).await;
        f.cache.set(&FailureKey::user(UserId::new(1)), 1).await;
        f.ledger.set_unavailable(true);

        assert!(f.guard.attempt("alice", "wrong", "10.0.0.1").await.is_err());

        assert_eq!(f.cache.get(&FailureKey::ip("10.0.0.1")).await, Some(2));
        assert_eq!(f.cache.get(&FailureKey::user(UserId::new(1))).await, Some(1));
    }

    #[tokio::test]
    async fn test_credential_store_unavailable() {
        let f = fixture(BruteForceConfig::default());
        f.credentials.set_unavailable(true);

        let err = f.guard.attempt("alice", "hunter2", "10.0.0.1").await.unwrap_err();

        assert!(err.is_storage_error());
        assert_eq!(f.ledger.len(), 0);
    }

    #[tokio::test]
    async fn test_banned_attempt_continues_user_count_from_ledger() {
        let f = fixture(BruteForceConfig::default().with_ip_ban_threshold(2));
        let alice = f.credentials.add("alice", "hunter2");

        f.guard.attempt("alice", "x", "10.0.0.1").await.unwrap();
        f.guard.attempt("alice", "x", "10.0.0.1").await.unwrap();
        f.guard.reset_cache().await;

        let outcome = f.guard.attempt("alice", "x", "10.0.0.1").await.unwrap();
        assert_eq!(outcome, LoginOutcome::Banned);
        assert_eq!(f.cache.get(&FailureKey::user(alice.id)).await, Some(3));
    }

    #[tokio::test]
    async fn test_cache_expiry_rederives_from_ledger() {
        let f = fixture(
            BruteForceConfig::default().with_cache_idle_ttl(Duration::from_millis(20)),
        );
        f.guard.attempt("ghost", "x", "10.0.0.1").await.unwrap();
        f.guard.attempt("ghost", "x", "10.0.0.1").await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        let key = FailureKey::ip("10.0.0.1");
        assert_eq!(f.cache.get(&key).await, None);
        assert_eq!(f.guard.failure_count(&key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_cold_key_attempts_are_all_counted() {
        let f = fixture(BruteForceConfig::default().with_ip_ban_threshold(3));
        let key = FailureKey::ip("10.0.0.1");
        f.ledger.delay_next_count(Duration::from_millis(100));

        // The first attempt derives a stale count while the second completes
        let (first, second) = tokio::join!(
            f.guard.attempt("ghost", "x", "10.0.0.1"),
            f.guard.attempt("ghost", "x", "10.0.0.1"),
        );
        assert_eq!(first.unwrap(), LoginOutcome::NotFound);
        assert_eq!(second.unwrap(), LoginOutcome::NotFound);
        assert_eq!(f.ledger.count_failures_since_last_success(&key).await.unwrap(), 2);
        assert_eq!(f.cache.get(&key).await, Some(2));

        let third = f.guard.attempt("ghost", "x", "10.0.0.1").await.unwrap();
        let fourth = f.guard.attempt("ghost", "x", "10.0.0.1").await.unwrap();
        assert_eq!(third, LoginOutcome::NotFound);
        assert_eq!(fourth, LoginOutcome::Banned);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_match_ledger() {
        let Fixture {
            credentials,
            ledger,
            cache,
            guard,
        } = fixture(
            BruteForceConfig::default()
                .with_ip_ban_threshold(1000)
                .with_user_lock_threshold(1000),
        );
        let alice = credentials.add("alice", "hunter2");
        let guard = Arc::new(guard);

        let mut handles = Vec::new();
        for i in 0..32 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                let login = if i % 2 == 0 { "alice" } else { "ghost" };
                guard.attempt(login, "wrong", "10.0.0.1").await.unwrap()
            }));
        }
        for handle in handles {
            assert!(!handle.await.unwrap().is_success());
        }

        let ip = FailureKey::ip("10.0.0.1");
        let user = FailureKey::user(alice.id);
        assert_eq!(ledger.count_failures_since_last_success(&ip).await.unwrap(), 32);
        assert_eq!(cache.get(&ip).await, Some(32));
        assert_eq!(ledger.count_failures_since_last_success(&user).await.unwrap(), 16);
        assert_eq!(cache.get(&user).await, Some(16));
    }

    #[tokio::test]
    async fn test_last_login_and_current_user() {
        let f = fixture(BruteForceConfig::default());
        let alice = f.credentials.add("alice", "hunter2");

        f.guard.attempt("alice", "hunter2", "10.0.0.1").await.unwrap();
        f.guard.attempt("alice", "hunter2", "10.0.0.2").await.unwrap();

        let last = f.guard.last_login(&alice.id).await.unwrap().unwrap();
        assert_eq!(last.ip, "10.0.0.1");
        assert_eq!(
            f.guard.current_user(&alice.id).await.unwrap().map(|u| u.login),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_public_messages() {
        assert_eq!(LoginOutcome::Banned.public_message(), Some("You're banned."));
        assert_eq!(
            LoginOutcome::Locked.public_message(),
            Some("This account is locked.")
        );
        assert_eq!(
            LoginOutcome::NotFound.public_message(),
            LoginOutcome::WrongPassword.public_message()
        );
        assert_eq!(
            LoginOutcome::NotFound.public_message(),
            Some("Wrong username or password")
        );
    }
}
