//! Backend-agnostic schema migrations.
//!
//! Each storage crate implements [`MigrationManager`] for its database and
//! ships its own [`Migration`]s. Applied versions are recorded in
//! [`MIGRATION_TABLE`] so that `up` is idempotent.
use std::collections::HashSet;

use async_trait::async_trait;
use palisade_core::error::StorageError;
use sqlx::Database;
use thiserror::Error;

/// Table that records applied migration versions.
pub const MIGRATION_TABLE: &str = "_palisade_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Duplicate migration version: {0}")]
    DuplicateVersion(i64),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<MigrationError> for palisade_core::Error {
    fn from(err: MigrationError) -> Self {
        StorageError::Migration(err.to_string()).into()
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Unix timestamp; stored as an integer on every backend
    pub applied_at: i64,
}

impl MigrationRecord {
    pub fn applied_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.applied_at, 0)
    }
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        MIGRATION_TABLE
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Rollback migrations
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;
}

/// Reject migration sets that reuse a version number.
pub fn check_versions<DB: Database>(migrations: &[Box<dyn Migration<DB>>]) -> Result<()> {
    let mut seen = HashSet::new();
    for migration in migrations {
        if !seen.insert(migration.version()) {
            tracing::error!(
                version = migration.version(),
                name = migration.name(),
                "Duplicate migration version"
            );
            return Err(MigrationError::DuplicateVersion(migration.version()));
        }
    }
    Ok(())
}

/// Migrations whose version is not in `applied`, in ascending version order.
pub fn pending<'a, DB: Database>(
    migrations: &'a [Box<dyn Migration<DB>>],
    applied: &[MigrationRecord],
) -> Vec<&'a dyn Migration<DB>> {
    let applied: HashSet<i64> = applied.iter().map(|r| r.version).collect();
    let mut pending: Vec<&dyn Migration<DB>> = migrations
        .iter()
        .map(|m| m.as_ref())
        .filter(|m| !applied.contains(&m.version()))
        .collect();
    pending.sort_by_key(|m| m.version());
    tracing::debug!(
        pending = pending.len(),
        applied = applied.len(),
        "Resolved pending migrations"
    );
    pending
}
