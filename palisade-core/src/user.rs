//! Accounts known to the credential store
//!
//! Users are owned by an external credential store and are read-only to the
//! brute force guard. The core user struct is defined as follows:
//!
//! | Field           | Type     | Description                                        |
//! | --------------- | -------- | -------------------------------------------------- |
//! | `id`            | `UserId` | The stable numeric identifier for the account.     |
//! | `login`         | `String` | The unique login name submitted on authentication. |
//! | `password_hash` | `String` | Hex digest of the salted password.                 |
//! | `salt`          | `String` | Per-account salt mixed into the password hash.     |
use serde::{Deserialize, Serialize};

/// A unique, stable identifier for an account in the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        UserId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An account as stored in the credential store.
///
/// The password hash and salt never leave the process through serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,

    pub login: String,

    #[serde(skip_serializing, default)]
    pub password_hash: String,

    #[serde(skip_serializing, default)]
    pub salt: String,
}

impl User {
    pub fn new(id: UserId, login: String, password_hash: String, salt: String) -> Self {
        Self {
            id,
            login,
            password_hash,
            salt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_display_and_conversion() {
        let id = UserId::from(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.as_i64(), 42);
        assert_eq!(id, UserId::new(42));
    }

    #[test]
    fn test_user_serialization_hides_credentials() {
        let user = User::new(
            UserId::new(1),
            "alice".to_string(),
            "deadbeef".to_string(),
            "pepper".to_string(),
        );

        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"login\":\"alice\""));
        assert!(!json.contains("deadbeef"));
        assert!(!json.contains("pepper"));
    }
}
