//! Repository traits for data access layer
//!
//! This module defines the repository interfaces that services use to interact with storage.
//!
//! # Trait Hierarchy
//!
//! - [`CredentialRepository`] and [`LoginAttemptRepository`] define the operations for
//!   each data domain
//! - [`CredentialRepositoryProvider`] and [`LoginAttemptRepositoryProvider`] provide access
//!   to each repository type
//! - [`RepositoryProvider`] is a supertrait combining both provider traits plus lifecycle
//!   methods
//!
//! Services never see the provider directly; the facade wraps it in the adapters from
//! [`adapter`] so that each service is generic over a single repository trait.

pub mod adapter;
pub mod credential;
pub mod login_attempt;

pub use adapter::{CredentialRepositoryAdapter, LoginAttemptRepositoryAdapter};
pub use credential::CredentialRepository;
pub use login_attempt::LoginAttemptRepository;

use async_trait::async_trait;

use crate::Error;

/// Provider trait for credential store access.
pub trait CredentialRepositoryProvider: Send + Sync + 'static {
    /// The credential repository implementation type
    type CredentialRepo: CredentialRepository;

    /// Get the credential repository
    fn credentials(&self) -> &Self::CredentialRepo;
}

/// Provider trait for attempt ledger access.
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    /// The ledger repository implementation type
    type LoginAttemptRepo: LoginAttemptRepository;

    /// Get the ledger repository
    fn login_attempts(&self) -> &Self::LoginAttemptRepo;
}

/// Provider trait that storage implementations must implement to provide all repositories.
///
/// # Implementing a Custom Storage Backend
///
/// 1. Implement [`CredentialRepository`] and [`LoginAttemptRepository`] for your backend
/// 2. Implement both `*RepositoryProvider` traits
/// 3. Implement this trait with `migrate()` and `health_check()`
///
/// ```rust,ignore
/// use palisade_core::repositories::*;
///
/// struct MyStorage { /* ... */ }
///
/// impl CredentialRepositoryProvider for MyStorage {
///     type CredentialRepo = MyCredentialRepository;
///     fn credentials(&self) -> &Self::CredentialRepo { &self.credentials }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: CredentialRepositoryProvider + LoginAttemptRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
