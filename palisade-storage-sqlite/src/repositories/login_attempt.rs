//! SQLite implementation of the attempt ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use palisade_core::{
    Error, UserId,
    error::{StorageError, utilities::DatabaseResultExt},
    repositories::LoginAttemptRepository,
    storage::{FailureKey, FailureWindow, KeyKind, LastLogin, LoginAttempt, NewLoginAttempt},
};
use sqlx::SqlitePool;

pub struct SqliteLoginAttemptRepository {
    pool: SqlitePool,
}

impl SqliteLoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: i64,
    created_at: i64,
    user_id: Option<i64>,
    login: String,
    ip: String,
    succeeded: bool,
}

impl From<SqliteLoginAttempt> for LoginAttempt {
    fn from(row: SqliteLoginAttempt) -> Self {
        LoginAttempt {
            id: row.id,
            created_at: DateTime::from_timestamp(row.created_at, 0).unwrap_or_default(),
            user_id: row.user_id.map(UserId::new),
            login: row.login,
            ip: row.ip,
            succeeded: row.succeeded,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteIpWindow {
    ip: String,
    failures: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteUserWindow {
    user_id: i64,
    login: String,
    failures: i64,
}

fn to_count(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

const COUNT_IP_FAILURES: &str = r#"
    SELECT COUNT(*) FROM login_attempts
    WHERE ip = ?1
      AND succeeded = 0
      AND id > COALESCE(
          (SELECT MAX(id) FROM login_attempts WHERE ip = ?1 AND succeeded = 1),
          0
      )
"#;

const COUNT_USER_FAILURES: &str = r#"
    SELECT COUNT(*) FROM login_attempts
    WHERE user_id = ?1
      AND succeeded = 0
      AND id > COALESCE(
          (SELECT MAX(id) FROM login_attempts WHERE user_id = ?1 AND succeeded = 1),
          0
      )
"#;

// Keys that never succeeded have no row in `last_success` and count every
// failure; keys that did count only failures after it.
const IP_WINDOWS: &str = r#"
    SELECT a.ip AS ip,
           SUM(CASE WHEN a.succeeded = 0 AND a.id > COALESCE(s.last_success_id, 0)
                    THEN 1 ELSE 0 END) AS failures
    FROM login_attempts a
    LEFT JOIN (
        SELECT ip, MAX(id) AS last_success_id
        FROM login_attempts
        WHERE succeeded = 1
        GROUP BY ip
    ) s ON s.ip = a.ip
    GROUP BY a.ip
    HAVING SUM(CASE WHEN a.succeeded = 0 AND a.id > COALESCE(s.last_success_id, 0)
                    THEN 1 ELSE 0 END) >= ?1
    ORDER BY a.ip
"#;

const USER_WINDOWS: &str = r#"
    SELECT a.user_id AS user_id,
           u.login AS login,
           SUM(CASE WHEN a.succeeded = 0 AND a.id > COALESCE(s.last_success_id, 0)
                    THEN 1 ELSE 0 END) AS failures
    FROM login_attempts a
    JOIN users u ON u.id = a.user_id
    LEFT JOIN (
        SELECT user_id, MAX(id) AS last_success_id
        FROM login_attempts
        WHERE succeeded = 1 AND user_id IS NOT NULL
        GROUP BY user_id
    ) s ON s.user_id = a.user_id
    WHERE a.user_id IS NOT NULL
    GROUP BY a.user_id, u.login
    HAVING SUM(CASE WHEN a.succeeded = 0 AND a.id > COALESCE(s.last_success_id, 0)
                    THEN 1 ELSE 0 END) >= ?1
    ORDER BY u.login
"#;

#[async_trait]
impl LoginAttemptRepository for SqliteLoginAttemptRepository {
    async fn append(&self, attempt: NewLoginAttempt) -> Result<LoginAttempt, Error> {
        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            INSERT INTO login_attempts (created_at, user_id, login, ip, succeeded)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, created_at, user_id, login, ip, succeeded
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(attempt.user_id.map(|id| id.as_i64()))
        .bind(&attempt.login)
        .bind(&attempt.ip)
        .bind(attempt.succeeded)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        Ok(row.into())
    }

    async fn count_failures_since_last_success(&self, key: &FailureKey) -> Result<u32, Error> {
        let query = match key {
            FailureKey::Ip(ip) => sqlx::query_scalar::<_, i64>(COUNT_IP_FAILURES).bind(ip.as_str()),
            FailureKey::User(id) => {
                sqlx::query_scalar::<_, i64>(COUNT_USER_FAILURES).bind(id.as_i64())
            }
        };

        let count = query.fetch_one(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, key = %key, "Failed to count failures");
            StorageError::Database("Failed to count failures".to_string())
        })?;

        Ok(to_count(count))
    }

    async fn failure_windows(
        &self,
        kind: KeyKind,
        minimum: u32,
    ) -> Result<Vec<FailureWindow>, Error> {
        let windows: Result<Vec<FailureWindow>, sqlx::Error> = match kind {
            KeyKind::Ip => sqlx::query_as::<_, SqliteIpWindow>(IP_WINDOWS)
                .bind(i64::from(minimum))
                .fetch_all(&self.pool)
                .await
                .map(|rows| {
                    rows.into_iter()
                        .map(|row| FailureWindow {
                            key: FailureKey::ip(row.ip.clone()),
                            label: row.ip,
                            failures: to_count(row.failures),
                        })
                        .collect()
                }),
            KeyKind::User => sqlx::query_as::<_, SqliteUserWindow>(USER_WINDOWS)
                .bind(i64::from(minimum))
                .fetch_all(&self.pool)
                .await
                .map(|rows| {
                    rows.into_iter()
                        .map(|row| FailureWindow {
                            key: FailureKey::user(UserId::new(row.user_id)),
                            label: row.login,
                            failures: to_count(row.failures),
                        })
                        .collect()
                }),
        };

        windows.map_err(|e| {
            tracing::error!(error = %e, kind = ?kind, "Failed to compute failure windows");
            Error::from(StorageError::Database(
                "Failed to compute failure windows".to_string(),
            ))
        })
    }

    async fn last_login(&self, user_id: &UserId) -> Result<Option<LastLogin>, Error> {
        let rows = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            SELECT id, created_at, user_id, login, ip, succeeded
            FROM login_attempts
            WHERE user_id = ?1 AND succeeded = 1
            ORDER BY id DESC
            LIMIT 2
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_db_err_with_context("Failed to fetch last login")?;

        Ok(rows
            .into_iter()
            .last()
            .map(|row| LastLogin::from(LoginAttempt::from(row))))
    }
}
