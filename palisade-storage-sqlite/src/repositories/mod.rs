//! Repository implementations for SQLite storage

pub mod credential;
pub mod login_attempt;

pub use credential::SqliteCredentialRepository;
pub use login_attempt::SqliteLoginAttemptRepository;

use async_trait::async_trait;
use palisade_core::{
    Error,
    error::StorageError,
    repositories::{
        CredentialRepositoryProvider, LoginAttemptRepositoryProvider, RepositoryProvider,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Repository provider implementation for SQLite
///
/// This struct implements both repository provider traits as well as the
/// unified `RepositoryProvider` trait.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    credentials: Arc<SqliteCredentialRepository>,
    login_attempts: Arc<SqliteLoginAttemptRepository>,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        let credentials = Arc::new(SqliteCredentialRepository::new(pool.clone()));
        let login_attempts = Arc::new(SqliteLoginAttemptRepository::new(pool.clone()));

        Self {
            pool,
            credentials,
            login_attempts,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl CredentialRepositoryProvider for SqliteRepositoryProvider {
    type CredentialRepo = SqliteCredentialRepository;

    fn credentials(&self) -> &Self::CredentialRepo {
        &self.credentials
    }
}

impl LoginAttemptRepositoryProvider for SqliteRepositoryProvider {
    type LoginAttemptRepo = SqliteLoginAttemptRepository;

    fn login_attempts(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempts
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        crate::migrations::run(&self.pool).await
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "SQLite health check failed");
                StorageError::Connection("SQLite health check failed".to_string())
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palisade_core::repositories::LoginAttemptRepository;
    use palisade_core::storage::{FailureKey, NewLoginAttempt};

    #[tokio::test]
    async fn test_provider_migrate_and_health_check() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        let provider = SqliteRepositoryProvider::new(pool);

        provider.migrate().await.expect("Failed to migrate");
        provider.health_check().await.expect("Health check failed");

        provider
            .login_attempts()
            .append(NewLoginAttempt::failed(None, "ghost", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(
            provider
                .login_attempts()
                .count_failures_since_last_success(&FailureKey::ip("10.0.0.1"))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_health_check_fails_on_closed_pool() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        let provider = SqliteRepositoryProvider::new(pool.clone());
        pool.close().await;

        let err = provider.health_check().await.unwrap_err();
        assert!(err.is_storage_error());
    }
}
