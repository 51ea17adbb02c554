use async_trait::async_trait;
use palisade_core::{
    Error, User, UserId,
    error::{StorageError, ValidationError, utilities::DatabaseResultExt},
    repositories::CredentialRepository,
    storage::NewUser,
};
use sqlx::PgPool;

pub struct PostgresCredentialRepository {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct PostgresUser {
    id: i64,
    login: String,
    password_hash: String,
    salt: String,
}

impl From<PostgresUser> for User {
    fn from(row: PostgresUser) -> Self {
        User::new(UserId::new(row.id), row.login, row.password_hash, row.salt)
    }
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Provision an account. Logins are unique.
    pub async fn create(&self, user: NewUser) -> Result<User, Error> {
        let row = sqlx::query_as::<_, PostgresUser>(
            r#"
            INSERT INTO users (login, password_hash, salt)
            VALUES ($1, $2, $3)
            RETURNING id, login, password_hash, salt
            "#,
        )
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                return Error::from(ValidationError::InvalidField(format!(
                    "Login {} is already taken",
                    user.login
                )));
            }
            tracing::error!(error = %e, "Failed to create user");
            Error::from(StorageError::Database("Failed to create user".to_string()))
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn find_by_login(&self, login: &str) -> Result<Option<User>, Error> {
        let row = sqlx::query_as::<_, PostgresUser>(
            "SELECT id, login, password_hash, salt FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to find user by login");
            StorageError::Database("Failed to find user by login".to_string())
        })?;

        Ok(row.map(User::from))
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        let row = sqlx::query_as::<_, PostgresUser>(
            "SELECT id, login, password_hash, salt FROM users WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_db_err_with_context("Failed to find user by id")?;

        Ok(row.map(User::from))
    }
}
