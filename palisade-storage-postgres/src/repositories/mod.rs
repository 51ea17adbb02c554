//! Repository implementations for PostgreSQL storage

pub mod credential;
pub mod login_attempt;

pub use credential::PostgresCredentialRepository;
pub use login_attempt::PostgresLoginAttemptRepository;

use async_trait::async_trait;
use palisade_core::{
    Error,
    error::StorageError,
    repositories::{
        CredentialRepositoryProvider, LoginAttemptRepositoryProvider, RepositoryProvider,
    },
};
use sqlx::PgPool;
use std::sync::Arc;

/// Repository provider implementation for PostgreSQL
pub struct PostgresRepositoryProvider {
    pool: PgPool,
    credentials: Arc<PostgresCredentialRepository>,
    login_attempts: Arc<PostgresLoginAttemptRepository>,
}

impl PostgresRepositoryProvider {
    pub fn new(pool: PgPool) -> Self {
        let credentials = Arc::new(PostgresCredentialRepository::new(pool.clone()));
        let login_attempts = Arc::new(PostgresLoginAttemptRepository::new(pool.clone()));

        Self {
            pool,
            credentials,
            login_attempts,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl CredentialRepositoryProvider for PostgresRepositoryProvider {
    type CredentialRepo = PostgresCredentialRepository;

    fn credentials(&self) -> &Self::CredentialRepo {
        &self.credentials
    }
}

impl LoginAttemptRepositoryProvider for PostgresRepositoryProvider {
    type LoginAttemptRepo = PostgresLoginAttemptRepository;

    fn login_attempts(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempts
    }
}

#[async_trait]
impl RepositoryProvider for PostgresRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        crate::migrations::run(&self.pool).await
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Postgres health check failed");
                StorageError::Connection("Postgres health check failed".to_string())
            })?;
        Ok(())
    }
}
