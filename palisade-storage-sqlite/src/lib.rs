//! SQLite storage backend for palisade
//!
//! Provides the attempt ledger and the credential store on top of a single
//! SQLite database.
//!
//! ```rust,no_run
//! use palisade_storage_sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = SqliteStorage::connect("sqlite://palisade.db").await?;
//! storage.migrate().await?;
//! let provider = storage.into_repository_provider();
//! # Ok(())
//! # }
//! ```
use std::str::FromStr;

use palisade_core::Error;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

pub mod migrations;
pub mod repositories;

pub use repositories::{
    SqliteCredentialRepository, SqliteLoginAttemptRepository, SqliteRepositoryProvider,
};

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url`, creating the database file if it does not exist.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), Error> {
        migrations::run(&self.pool).await
    }

    pub fn into_repository_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }
}
