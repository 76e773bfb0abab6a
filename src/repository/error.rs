// ==========================================
// Product Feed Import - repository error type
// ==========================================
// thiserror enum shared by every SQLite repository and
// by the in-memory progress store.
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== Lookup =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== Database =====
    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("failed to acquire lock: {0}")]
    LockError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("database query failed: {0}")]
    DatabaseQueryError(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    // ===== Stored data =====
    #[error("invalid stored value (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn lock<E: std::fmt::Display>(err: E) -> Self {
        RepositoryError::LockError(err.to_string())
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::FieldValueError {
            field: "json".to_string(),
            message: err.to_string(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
