// ==========================================
// Product Feed Import - domain enums
// ==========================================
// Closed sets of values shared by every layer.
// Serialized as snake_case (same strings are stored in SQLite).
// ==========================================

use crate::domain::target_schema::TargetField;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing one of the domain enums from its string form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ==========================================
// Feed format
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedFormat {
    Xml,
    Csv,
    Json,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedFormat::Xml => "xml",
            FeedFormat::Csv => "csv",
            FeedFormat::Json => "json",
        }
    }
}

impl FromStr for FeedFormat {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xml" => Ok(FeedFormat::Xml),
            "csv" => Ok(FeedFormat::Csv),
            "json" => Ok(FeedFormat::Json),
            other => Err(UnknownVariant::new("feed format", other)),
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Import mode
// ==========================================
// create_update: create on miss, update on hit
// create_only:   create on miss, skip on hit
// update_only:   update on hit, skip on miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    #[default]
    CreateUpdate,
    CreateOnly,
    UpdateOnly,
}

impl ImportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::CreateUpdate => "create_update",
            ImportMode::CreateOnly => "create_only",
            ImportMode::UpdateOnly => "update_only",
        }
    }

    pub fn allows_create(&self) -> bool {
        matches!(self, ImportMode::CreateUpdate | ImportMode::CreateOnly)
    }

    pub fn allows_update(&self) -> bool {
        matches!(self, ImportMode::CreateUpdate | ImportMode::UpdateOnly)
    }
}

impl FromStr for ImportMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "create_update" => Ok(ImportMode::CreateUpdate),
            "create_only" => Ok(ImportMode::CreateOnly),
            "update_only" => Ok(ImportMode::UpdateOnly),
            other => Err(UnknownVariant::new("import mode", other)),
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Match key
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKey {
    #[default]
    Ean,
    Sku,
    ExternalId,
    Title,
}

impl MatchKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKey::Ean => "ean",
            MatchKey::Sku => "sku",
            MatchKey::ExternalId => "external_id",
            MatchKey::Title => "title",
        }
    }

    /// Target field holding the key value.
    pub fn target_field(&self) -> TargetField {
        match self {
            MatchKey::Ean => TargetField::Ean,
            MatchKey::Sku => TargetField::Sku,
            MatchKey::ExternalId => TargetField::ExternalId,
            MatchKey::Title => TargetField::Title,
        }
    }

    /// Normalizes a raw key value for lookup.
    ///
    /// ean/sku/external_id compare exactly (only surrounding whitespace is dropped);
    /// title compares case-insensitively with inner whitespace collapsed.
    pub fn normalize(&self, value: &str) -> String {
        match self {
            MatchKey::Title => normalize_title(value),
            _ => value.trim().to_string(),
        }
    }
}

/// Lowercased title with runs of whitespace collapsed to a single space.
pub fn normalize_title(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl FromStr for MatchKey {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ean" => Ok(MatchKey::Ean),
            "sku" => Ok(MatchKey::Sku),
            "external_id" => Ok(MatchKey::ExternalId),
            "title" => Ok(MatchKey::Title),
            other => Err(UnknownVariant::new("match key", other)),
        }
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Transform type
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    #[default]
    None,
    Trim,
    Lowercase,
    Uppercase,
    Price,
    /// Always replaces the source value with `transform_value`.
    Default,
}

impl TransformType {
    pub const ALL: [TransformType; 6] = [
        TransformType::None,
        TransformType::Trim,
        TransformType::Lowercase,
        TransformType::Uppercase,
        TransformType::Price,
        TransformType::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformType::None => "none",
            TransformType::Trim => "trim",
            TransformType::Lowercase => "lowercase",
            TransformType::Uppercase => "uppercase",
            TransformType::Price => "price",
            TransformType::Default => "default",
        }
    }
}

impl FromStr for TransformType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "none" => Ok(TransformType::None),
            "trim" => Ok(TransformType::Trim),
            "lowercase" => Ok(TransformType::Lowercase),
            "uppercase" => Ok(TransformType::Uppercase),
            "price" => Ok(TransformType::Price),
            "default" => Ok(TransformType::Default),
            other => Err(UnknownVariant::new("transform type", other)),
        }
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Run status
// ==========================================
// idle -> running -> {completed | failed | cancelled}
// Idle only exists in the live progress projection, never in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl FromStr for RunStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "idle" => Ok(RunStatus::Idle),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => Err(UnknownVariant::new("run status", other)),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// Log level of a run's log tail
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}
