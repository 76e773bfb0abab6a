// ==========================================
// Product Feed Import - API error type
// ==========================================
// Translates importer and repository failures into caller-facing
// errors. Every message carries an explicit reason.
// ==========================================

use crate::domain::target_schema::TargetField;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // Input / lookup
    // ==========================================
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("required target fields are not mapped: {}", join_fields(.0))]
    MissingRequiredMappings(Vec<TargetField>),

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // Run lifecycle
    // ==========================================
    #[error("an import is already running for feed {0}")]
    AlreadyRunning(String),

    #[error("no import is running for feed {0}")]
    NotRunning(String),

    #[error("feed {0} is in use by a running import")]
    FeedBusy(String),

    // ==========================================
    // Source
    // ==========================================
    #[error("feed unreachable: {0}")]
    FeedUnreachable(String),

    #[error("feed could not be parsed: {0}")]
    FeedParseError(String),

    // ==========================================
    // Data access
    // ==========================================
    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // General
    // ==========================================
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_fields(fields: &[TargetField]) -> String {
    fields
        .iter()
        .map(TargetField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ==========================================
// From RepositoryError
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("failed to acquire database lock: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) | RepositoryError::DatabaseQueryError(msg) => {
                ApiError::DatabaseError(msg)
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("unique constraint violated: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::ValidationError(format!("foreign key constraint violated: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("stored value of {} is invalid: {}", field, message))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
        }
    }
}

// ==========================================
// From ImportError
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FeedUnreachable(msg) => ApiError::FeedUnreachable(msg),
            ImportError::FeedParseError(msg) => ApiError::FeedParseError(msg),
            ImportError::AlreadyRunning(feed_id) => ApiError::AlreadyRunning(feed_id),
            ImportError::NotRunning(feed_id) => ApiError::NotRunning(feed_id),
            ImportError::FeedBusy(feed_id) => ApiError::FeedBusy(feed_id),
            ImportError::FeedNotFound(feed_id) => ApiError::NotFound(format!("Feed(id={})", feed_id)),
            ImportError::FeedInactive(feed_id) => {
                ApiError::ValidationError(format!("feed {} is inactive", feed_id))
            }
            ImportError::MissingRequiredMappings { missing } => ApiError::MissingRequiredMappings(missing),
            ImportError::InvalidMapping(msg) => ApiError::ValidationError(msg),
            ImportError::Repository(err) => err.into(),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
