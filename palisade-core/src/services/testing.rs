//! In-memory repositories for service tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    Error, User, UserId,
    crypto::{PasswordHasher, Sha256PasswordHasher},
    error::StorageError,
    repositories::{CredentialRepository, LoginAttemptRepository},
    storage::{FailureKey, FailureWindow, KeyKind, LastLogin, LoginAttempt, NewLoginAttempt},
};

fn unavailable() -> Error {
    StorageError::Connection("store is unreachable".to_string()).into()
}

fn matches(attempt: &LoginAttempt, key: &FailureKey) -> bool {
    match key {
        FailureKey::Ip(ip) => &attempt.ip == ip,
        FailureKey::User(id) => attempt.user_id == Some(*id),
    }
}

fn failures_since_last_success(records: &[LoginAttempt], key: &FailureKey) -> u32 {
    let last_success = records
        .iter()
        .filter(|a| a.succeeded && matches(a, key))
        .map(|a| a.id)
        .max()
        .unwrap_or(0);
    records
        .iter()
        .filter(|a| !a.succeeded && a.id > last_success && matches(a, key))
        .count() as u32
}

#[derive(Default)]
pub(crate) struct MockLedger {
    pub(crate) records: Mutex<Vec<LoginAttempt>>,
    pub(crate) unavailable: AtomicBool,
    count_delay_ms: AtomicU64,
}

impl MockLedger {
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Hold the next failure count for `delay` after reading the records,
    /// so the value it returns is stale by the time it arrives.
    pub(crate) fn delay_next_count(&self, delay: Duration) {
        self.count_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn check(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LoginAttemptRepository for MockLedger {
    async fn append(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        let record = LoginAttempt {
            id: records.len() as i64 + 1,
            created_at: Utc::now(),
            user_id: attempt.user_id,
            login: attempt.login,
            ip: attempt.ip,
            succeeded: attempt.succeeded,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn count_failures_since_last_success(&self, key: &FailureKey) -> Result<u32, Error> {
        self.check()?;
        let count = failures_since_last_success(&self.records.lock().unwrap(), key);

        let delay = self.count_delay_ms.swap(0, Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(count)
    }

    async fn failure_windows(
        &self,
        kind: KeyKind,
        minimum: u32,
    ) -> Result<Vec<FailureWindow>, Error> {
        self.check()?;
        let records = self.records.lock().unwrap();

        let mut labels: BTreeMap<FailureKey, String> = BTreeMap::new();
        for attempt in records.iter() {
            match kind {
                KeyKind::Ip => {
                    labels.insert(FailureKey::ip(attempt.ip.clone()), attempt.ip.clone());
                }
                KeyKind::User => {
                    if let Some(id) = attempt.user_id {
                        labels.insert(FailureKey::user(id), attempt.login.clone());
                    }
                }
            }
        }

        Ok(labels
            .into_iter()
            .map(|(key, label)| FailureWindow {
                failures: failures_since_last_success(&records, &key),
                key,
                label,
            })
            .filter(|window| window.failures >= minimum)
            .collect())
    }

    async fn last_login(&self, user_id: &UserId) -> Result<Option<LastLogin>, Error> {
        self.check()?;
        let records = self.records.lock().unwrap();
        let successes: Vec<_> = records
            .iter()
            .rev()
            .filter(|a| a.succeeded && a.user_id == Some(*user_id))
            .take(2)
            .cloned()
            .collect();
        Ok(successes.into_iter().last().map(LastLogin::from))
    }
}

#[derive(Default)]
pub(crate) struct MockCredentials {
    users: Mutex<Vec<User>>,
    unavailable: AtomicBool,
}

impl MockCredentials {
    pub(crate) fn add(&self, login: &str, password: &str) -> User {
        let mut users = self.users.lock().unwrap();
        let salt = format!("salt-{login}");
        let user = User::new(
            UserId::new(users.len() as i64 + 1),
            login.to_string(),
            Sha256PasswordHasher.hash(password, &salt),
            salt,
        );
        users.push(user.clone());
        user
    }

    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CredentialRepository for MockCredentials {
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, Error> {
        self.check()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.login == login).cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.check()?;
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == *id).cloned())
    }
}
