// ==========================================
// Product Feed Import - importer error type
// ==========================================
// Run-level failures only. Per-record problems are values
// (FieldError / RecordError) and never surface here.
// ==========================================

use crate::domain::target_schema::TargetField;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== Source =====
    #[error("feed unreachable: {0}")]
    FeedUnreachable(String),

    #[error("feed parse error: {0}")]
    FeedParseError(String),

    // ===== Run lifecycle =====
    #[error("an import is already running for feed {0}")]
    AlreadyRunning(String),

    #[error("no import is running for feed {0}")]
    NotRunning(String),

    #[error("feed {0} is in use by a running import")]
    FeedBusy(String),

    #[error("feed not found: {0}")]
    FeedNotFound(String),

    #[error("feed {0} is inactive")]
    FeedInactive(String),

    // ===== Configuration =====
    #[error("required target fields are not mapped: {}", join_fields(.missing))]
    MissingRequiredMappings { missing: Vec<TargetField> },

    #[error("invalid mapping: {0}")]
    InvalidMapping(String),

    // ===== Storage =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("internal error: {0}")]
    InternalError(String),
}

fn join_fields(fields: &[TargetField]) -> String {
    fields
        .iter()
        .map(TargetField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::FeedParseError(format!("CSV: {}", err))
    }
}

impl From<quick_xml::Error> for ImportError {
    fn from(err: quick_xml::Error) -> Self {
        ImportError::FeedParseError(format!("XML: {}", err))
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::FeedParseError(format!("JSON: {}", err))
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::FeedUnreachable(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ImportError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImportError::InternalError(err.to_string())
    }
}

pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_names_fields() {
        let err = ImportError::MissingRequiredMappings {
            missing: vec![TargetField::Title, TargetField::Price],
        };
        assert_eq!(
            err.to_string(),
            "required target fields are not mapped: title, price"
        );
    }
}
