pub mod utilities;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Failures of the ledger or credential store.
///
/// Any of these means the outcome of an attempt could not be durably
/// determined. Callers must treat them as "unavailable", never as "allowed".
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl Error {
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let storage_error = Error::Storage(StorageError::Database("disk full".to_string()));
        assert_eq!(
            storage_error.to_string(),
            "Storage error: Database error: disk full"
        );

        let validation_error =
            Error::Validation(ValidationError::InvalidField("ip_ban_threshold".to_string()));
        assert_eq!(
            validation_error.to_string(),
            "Validation error: Invalid field: ip_ban_threshold"
        );
    }

    #[test]
    fn test_storage_error_variants() {
        let db_error = StorageError::Database("connection failed".to_string());
        assert_eq!(db_error.to_string(), "Database error: connection failed");

        let migration = StorageError::Migration("version 2".to_string());
        assert_eq!(migration.to_string(), "Migration error: version 2");

        let connection = StorageError::Connection("refused".to_string());
        assert_eq!(connection.to_string(), "Connection error: refused");
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::Storage(StorageError::Connection("x".to_string())).is_storage_error());
        assert!(!Error::Storage(StorageError::Connection("x".to_string())).is_validation_error());
        assert!(
            Error::Validation(ValidationError::MissingField("login".to_string()))
                .is_validation_error()
        );
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = StorageError::Database("boom".to_string()).into();
        assert!(matches!(error, Error::Storage(StorageError::Database(_))));

        let error: Error = ValidationError::MissingField("salt".to_string()).into();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::MissingField(_))
        ));
    }
}
