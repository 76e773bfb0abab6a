// ==========================================
// Product Feed Import - feed configuration validator
// ==========================================
// Checks a FeedConfig before it is saved (create and update).
// Basic attributes are checked first and reported together;
// the mapping list is checked last.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::feed::FeedConfig;
use crate::importer::feed_fetcher::local_path;
use crate::importer::feed_parser::csv_delimiter;
use crate::importer::field_mapper::FieldMapper;
use serde::{Deserialize, Serialize};

const MAX_NAME_LEN: usize = 255;

/// One rejected attribute of a feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub field: String,
    pub reason: String,
}

impl ValidationViolation {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub struct FeedConfigValidator;

impl FeedConfigValidator {
    /// Attribute-level problems of `config`, empty when it is acceptable.
    pub fn violations(config: &FeedConfig) -> Vec<ValidationViolation> {
        let mut violations = Vec::new();

        if config.merchant_id.trim().is_empty() {
            violations.push(ValidationViolation::new("merchant_id", "must not be empty"));
        }

        let name = config.name.trim();
        if name.is_empty() {
            violations.push(ValidationViolation::new("name", "must not be empty"));
        } else if name.chars().count() > MAX_NAME_LEN {
            violations.push(ValidationViolation::new(
                "name",
                format!("must be at most {} characters", MAX_NAME_LEN),
            ));
        }

        let url = config.source_url.trim();
        if url.is_empty() {
            violations.push(ValidationViolation::new("source_url", "must not be empty"));
        } else if local_path(url).is_none()
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            violations.push(ValidationViolation::new(
                "source_url",
                format!("unsupported URL scheme: {}", url),
            ));
        }

        if let Err(e) = csv_delimiter(config.format_options.csv_delimiter) {
            violations.push(ValidationViolation::new("format_options.csv_delimiter", e.to_string()));
        }

        violations
    }

    /// Full check of a configuration about to be stored.
    ///
    /// # Errors
    /// - `ValidationError` listing every attribute violation
    /// - `MissingRequiredMappings` / `ValidationError` for the mapping list
    pub fn validate(config: &FeedConfig) -> ApiResult<()> {
        let violations = Self::violations(config);
        if !violations.is_empty() {
            let reasons = violations
                .iter()
                .map(|v| format!("{}: {}", v.field, v.reason))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::ValidationError(reasons));
        }

        FieldMapper::validate_mappings(&config.field_mappings)?;
        Ok(())
    }
}
