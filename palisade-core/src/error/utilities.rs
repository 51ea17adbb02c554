use crate::{
    Error,
    error::{StorageError, ValidationError},
};

/// Extension trait for mapping backend errors into palisade storage errors.
///
/// Storage backends log the underlying driver error and surface a
/// `StorageError::Database` so that callers see one error kind regardless of
/// the database in use.
///
/// # Example
///
/// ```rust,ignore
/// use palisade_core::error::utilities::DatabaseResultExt;
///
/// sqlx::query("SELECT 1")
///     .execute(&pool)
///     .await
///     .map_db_err_with_context("Health check failed")?;
/// ```
pub trait DatabaseResultExt<T> {
    /// Convert a database error to a storage error
    fn map_db_err(self) -> Result<T, Error>;

    /// Convert a database error to a storage error, logging it with context
    fn map_db_err_with_context(self, context: &str) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> DatabaseResultExt<T> for Result<T, E> {
    fn map_db_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(e.to_string())))
    }

    fn map_db_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{context}");
            Error::Storage(StorageError::Database(format!("{context}: {e}")))
        })
    }
}

/// Extension trait for Option types to simplify required field validation
///
/// ```rust
/// use palisade_core::error::utilities::RequiredFieldExt;
///
/// let login: Option<String> = Some("alice".to_string());
/// let login = login.require_field("Login").unwrap();
/// assert_eq!(login, "alice");
/// ```
pub trait RequiredFieldExt<T> {
    /// Convert None to a ValidationError::MissingField
    fn require_field(self, field_name: &str) -> Result<T, ValidationError>;
}

impl<T> RequiredFieldExt<T> for Option<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError> {
        self.ok_or_else(|| ValidationError::MissingField(format!("{field_name} is required")))
    }
}
