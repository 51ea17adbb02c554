//! # Palisade
//!
//! Palisade guards password logins against credential stuffing and brute force
//! attacks. Every attempt is appended to a durable ledger; failures since the
//! last success are counted per client IP and per account, and attempts are
//! refused once a configurable threshold is reached.
//!
//! The ledger is authoritative. An in-memory counter cache answers the hot
//! path and is rebuilt from the ledger whenever an entry is cold, so a restart
//! or an evicted entry never loses a ban.
//!
//! ## Storage Support
//!
//! - SQLite (`sqlite` feature, default)
//! - Postgres (`postgres` feature)
//!
//! ## Example
//!
//! ```rust,no_run
//! use palisade::{ClientAddress, LoginOutcome, PalisadeBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let palisade = PalisadeBuilder::new()
//!         .with_sqlite("sqlite://palisade.db")
//!         .await?
//!         .apply_migrations(true)
//!         .warm_start_on_build(true)
//!         .build()
//!         .await?;
//!
//!     let ip = ClientAddress::resolve(Some("203.0.113.7"), "10.0.0.1");
//!     match palisade.attempt_login("alice", "hunter2", &ip).await? {
//!         LoginOutcome::Success(user) => println!("welcome back, {}", user.login),
//!         outcome => println!("{}", outcome.public_message().unwrap_or_default()),
//!     }
//!
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use palisade_core::repositories::{CredentialRepositoryAdapter, LoginAttemptRepositoryAdapter};
use tokio::{sync::watch, task::JoinHandle};

pub mod builder;

pub use builder::{NoStorage, PalisadeBuilder, PalisadeBuilderError, WithStorage};

/// Re-export core types from palisade_core
///
/// These types are commonly used when working with the Palisade API.
pub use palisade_core::{
    BruteForceConfig, ClientAddress, FailureCounterCache, FailureKey, InMemoryFailureCache,
    LastLogin, LoginOutcome, NewUser, PasswordHasher, Report, Sha256PasswordHasher, User,
    UserId,
};

/// Re-export the storage backend traits
pub use palisade_core::repositories::{
    CredentialRepositoryProvider, LoginAttemptRepositoryProvider, RepositoryProvider,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use palisade_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

#[cfg(feature = "postgres")]
pub use palisade_storage_postgres::{PostgresRepositoryProvider, PostgresStorage};

type Guard<R, C> = palisade_core::BruteForceGuard<
    CredentialRepositoryAdapter<R>,
    LoginAttemptRepositoryAdapter<R>,
    C,
>;

/// Errors that can occur when using Palisade.
///
/// Refusals such as bans and locks are not errors; they are reported through
/// [`LoginOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum PalisadeError {
    /// The ledger or the credential store could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    /// The request or the configuration was rejected
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<palisade_core::Error> for PalisadeError {
    fn from(error: palisade_core::Error) -> Self {
        match error {
            palisade_core::Error::Storage(e) => PalisadeError::Unavailable(e.to_string()),
            palisade_core::Error::Validation(e) => PalisadeError::Configuration(e.to_string()),
        }
    }
}

struct EvictionTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// The brute force protection coordinator.
///
/// `Palisade` wires the guard and the audit reporter to one repository
/// provider and one failure counter cache. Construct it with
/// [`PalisadeBuilder`] or, for a custom cache, [`Palisade::with_cache`].
///
/// # Example
///
/// ```rust,no_run
/// use palisade::{Palisade, SqliteRepositoryProvider};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
///     let palisade = Palisade::new(Arc::new(SqliteRepositoryProvider::new(pool)));
///     palisade.migrate().await?;
///
///     let report = palisade.report().await?;
///     println!("banned: {:?}", report.banned_ips);
///     Ok(())
/// }
/// ```
pub struct Palisade<R: RepositoryProvider, C: FailureCounterCache = InMemoryFailureCache> {
    repositories: Arc<R>,
    guard: Guard<R, C>,
    reporter: palisade_core::AuditReporter<LoginAttemptRepositoryAdapter<R>>,
    eviction: Option<EvictionTask>,
}

impl<R: RepositoryProvider> Palisade<R> {
    /// Create a Palisade instance with the default configuration, the
    /// SHA-256 password hasher and an in-memory counter cache.
    pub fn new(repositories: Arc<R>) -> Self {
        let config = BruteForceConfig::default();
        let cache = Arc::new(InMemoryFailureCache::new(config.cache_idle_ttl));
        Self::with_cache(repositories, cache, Arc::new(Sha256PasswordHasher), config)
    }

    /// Periodically purge expired counters from the in-memory cache.
    ///
    /// Must be called from within a tokio runtime. The sweeper stops when
    /// [`Palisade::shutdown`] is called or the instance is dropped.
    pub fn with_cache_eviction(mut self, every: std::time::Duration) -> Self {
        self.stop_eviction();

        let (shutdown, receiver) = watch::channel(false);
        let handle = self
            .guard
            .counters()
            .cache()
            .start_eviction_task(every, receiver);
        self.eviction = Some(EvictionTask { shutdown, handle });
        self
    }
}

impl<R: RepositoryProvider, C: FailureCounterCache> Palisade<R, C> {
    /// Create a Palisade instance around an existing counter cache.
    ///
    /// # Arguments
    ///
    /// * `repositories` - The storage backend
    /// * `cache` - The failure counter cache, possibly shared with other instances
    /// * `hasher` - Hashes submitted passwords for comparison with stored hashes
    /// * `config` - Ban and lock thresholds
    pub fn with_cache(
        repositories: Arc<R>,
        cache: Arc<C>,
        hasher: Arc<dyn PasswordHasher>,
        config: BruteForceConfig,
    ) -> Self {
        let credentials = Arc::new(CredentialRepositoryAdapter::new(repositories.clone()));
        let ledger = Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone()));

        let reporter = palisade_core::AuditReporter::new(
            ledger.clone(),
            config.ip_ban_threshold,
            config.user_lock_threshold,
        );
        let guard = palisade_core::BruteForceGuard::new(credentials, ledger, cache, hasher, config);

        Self {
            repositories,
            guard,
            reporter,
            eviction: None,
        }
    }

    /// The storage backend, e.g. to provision accounts.
    pub fn repositories(&self) -> &Arc<R> {
        &self.repositories
    }

    pub fn config(&self) -> &BruteForceConfig {
        self.guard.config()
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), PalisadeError> {
        self.repositories.migrate().await?;
        Ok(())
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), PalisadeError> {
        self.repositories.health_check().await?;
        Ok(())
    }

    /// Authenticate `login` with `password` on behalf of `ip`.
    ///
    /// Exactly one ledger record is written per call that returns `Ok`. When
    /// storage fails, [`PalisadeError::Unavailable`] is returned, nothing is
    /// written and the attempt must be treated as refused.
    ///
    /// # Arguments
    ///
    /// * `login` - The submitted login name
    /// * `password` - The submitted password
    /// * `ip` - The client address, see [`ClientAddress::resolve`]
    pub async fn attempt_login(
        &self,
        login: &str,
        password: &str,
        ip: &str,
    ) -> Result<LoginOutcome, PalisadeError> {
        Ok(self.guard.attempt(login, password, ip).await?)
    }

    /// Banned IPs and locked accounts, recomputed from the ledger.
    pub async fn report(&self) -> Result<Report, PalisadeError> {
        Ok(self.reporter.report().await?)
    }

    /// Replace the counter cache contents with ledger-derived counts.
    pub async fn warm_start(&self) -> Result<(), PalisadeError> {
        self.guard.warm_start().await?;
        Ok(())
    }

    /// Drop every cached counter; they are rederived from the ledger on demand.
    pub async fn reset_cache(&self) {
        self.guard.reset_cache().await
    }

    /// Failures since last success for one key.
    pub async fn failure_count(&self, key: &FailureKey) -> Result<u32, PalisadeError> {
        Ok(self.guard.failure_count(key).await?)
    }

    /// Look up the account behind a session's user id.
    pub async fn current_user(&self, user_id: &UserId) -> Result<Option<User>, PalisadeError> {
        Ok(self.guard.current_user(user_id).await?)
    }

    /// The login before the current one, or the current one if it is the first.
    pub async fn last_login(&self, user_id: &UserId) -> Result<Option<LastLogin>, PalisadeError> {
        Ok(self.guard.last_login(user_id).await?)
    }

    /// Stop the cache eviction sweeper, if one is running, and wait for it.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.eviction.take() {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "Cache eviction task did not shut down cleanly");
            }
        }
    }

    fn stop_eviction(&mut self) {
        if let Some(task) = self.eviction.take() {
            let _ = task.shutdown.send(true);
        }
    }
}

impl<R: RepositoryProvider, C: FailureCounterCache> Drop for Palisade<R, C> {
    fn drop(&mut self) {
        self.stop_eviction();
    }
}
