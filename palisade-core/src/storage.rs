//! Ledger records and the types derived from them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    UserId,
    crypto::{PasswordHasher, generate_salt},
    error::{Error, ValidationError, utilities::RequiredFieldExt},
};

/// One row of the append-only attempt ledger.
///
/// Records are immutable once written. `id` is assigned by the ledger in
/// append order and is the authoritative tie-break for "most recent success".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    /// Absent when the submitted login did not resolve to an account
    pub user_id: Option<UserId>,
    /// Raw submitted login, kept even when it did not resolve
    pub login: String,
    pub ip: String,
    pub succeeded: bool,
}

/// An attempt that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoginAttempt {
    pub user_id: Option<UserId>,
    pub login: String,
    pub ip: String,
    pub succeeded: bool,
}

impl NewLoginAttempt {
    pub fn succeeded(user_id: UserId, login: &str, ip: &str) -> Self {
        Self {
            user_id: Some(user_id),
            login: login.to_string(),
            ip: ip.to_string(),
            succeeded: true,
        }
    }

    pub fn failed(user_id: Option<UserId>, login: &str, ip: &str) -> Self {
        Self {
            user_id,
            login: login.to_string(),
            ip: ip.to_string(),
            succeeded: false,
        }
    }
}

/// The two key spaces failures are counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    Ip,
    User,
}

/// Identifies one failure counter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKey {
    Ip(String),
    User(UserId),
}

impl FailureKey {
    pub fn ip(ip: impl Into<String>) -> Self {
        FailureKey::Ip(ip.into())
    }

    pub fn user(user_id: UserId) -> Self {
        FailureKey::User(user_id)
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            FailureKey::Ip(_) => KeyKind::Ip,
            FailureKey::User(_) => KeyKind::User,
        }
    }
}

impl std::fmt::Display for FailureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKey::Ip(ip) => write!(f, "failure-ip-{ip}"),
            FailureKey::User(id) => write!(f, "failure-user-{id}"),
        }
    }
}

/// Failures since last success for one key, computed in bulk.
///
/// `label` is the IP address for IP keys and the account login for user keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureWindow {
    pub key: FailureKey,
    pub label: String,
    pub failures: u32,
}

/// Where and when an account last logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastLogin {
    pub created_at: DateTime<Utc>,
    pub ip: String,
    pub login: String,
}

impl From<LoginAttempt> for LastLogin {
    fn from(attempt: LoginAttempt) -> Self {
        Self {
            created_at: attempt.created_at,
            ip: attempt.ip,
            login: attempt.login,
        }
    }
}

/// Provisioning input for the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
    pub salt: String,
}

impl NewUser {
    pub fn builder() -> NewUserBuilder {
        NewUserBuilder::default()
    }

    /// Hash `password` under a freshly generated salt.
    pub fn with_password(login: &str, password: &str, hasher: &dyn PasswordHasher) -> Self {
        let salt = generate_salt();
        Self {
            login: login.to_string(),
            password_hash: hasher.hash(password, &salt),
            salt,
        }
    }
}

#[derive(Default)]
pub struct NewUserBuilder {
    login: Option<String>,
    password_hash: Option<String>,
    salt: Option<String>,
}

impl NewUserBuilder {
    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn password_hash(mut self, password_hash: impl Into<String>) -> Self {
        self.password_hash = Some(password_hash.into());
        self
    }

    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn build(self) -> Result<NewUser, Error> {
        let login = self.login.require_field("Login")?;
        if login.trim().is_empty() {
            return Err(ValidationError::InvalidField("Login must not be blank".to_string()).into());
        }

        Ok(NewUser {
            login,
            password_hash: self.password_hash.require_field("Password hash")?,
            salt: self.salt.require_field("Salt")?,
        })
    }
}
