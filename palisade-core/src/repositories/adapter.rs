use crate::{
    Error, User, UserId,
    repositories::{CredentialRepository, LoginAttemptRepository, RepositoryProvider},
    storage::{FailureKey, FailureWindow, KeyKind, LastLogin, LoginAttempt, NewLoginAttempt},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Adapter that wraps a RepositoryProvider and implements [`CredentialRepository`]
pub struct CredentialRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> CredentialRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> CredentialRepository for CredentialRepositoryAdapter<R> {
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, Error> {
        self.provider.credentials().find_by_login(login).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.provider.credentials().find_by_id(id).await
    }
}

/// Adapter that wraps a RepositoryProvider and implements [`LoginAttemptRepository`]
pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn append(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.provider.login_attempts().append(attempt).await
    }

    async fn count_failures_since_last_success(&self, key: &FailureKey) -> Result<u32, Error> {
        self.provider
            .login_attempts()
            .count_failures_since_last_success(key)
            .await
    }

    async fn failure_windows(
        &self,
        kind: KeyKind,
        minimum: u32,
    ) -> Result<Vec<FailureWindow>, Error> {
        self.provider
            .login_attempts()
            .failure_windows(kind, minimum)
            .await
    }

    async fn last_login(&self, user_id: &UserId) -> Result<Option<LastLogin>, Error> {
        self.provider.login_attempts().last_login(user_id).await
    }
}
