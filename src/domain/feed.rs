// ==========================================
// Product Feed Import - feed configuration model
// ==========================================
// Feed: one configured import source owned by a merchant.
// FieldMapping: one ordered source -> target rule.
// ==========================================

use crate::domain::target_schema::TargetField;
use crate::domain::types::{FeedFormat, ImportMode, MatchKey, TransformType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_XML_ITEM_PATH: &str = "SHOPITEM";
pub const DEFAULT_CSV_DELIMITER: char = ';';

// ==========================================
// FormatOptions
// ==========================================
// xml_item_path: repeating record element, bare name ("SHOPITEM") or
//                slash path ("SHOP/SHOPITEM"); for JSON, the key path
//                holding the item array when the top level is an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub xml_item_path: Option<String>,
    pub csv_delimiter: char,
    pub csv_has_header: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            xml_item_path: Some(DEFAULT_XML_ITEM_PATH.to_string()),
            csv_delimiter: DEFAULT_CSV_DELIMITER,
            csv_has_header: true,
        }
    }
}

impl FormatOptions {
    pub fn item_path(&self) -> Option<&str> {
        self.xml_item_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

// ==========================================
// FieldMapping
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: TargetField,
    #[serde(default)]
    pub transform_type: TransformType,
    #[serde(default)]
    pub transform_value: String,
    /// Used when the source value is absent or blank.
    #[serde(default)]
    pub default_value: String,
    /// Copied from the target schema when the mapping is created.
    #[serde(default)]
    pub is_required: bool,
}

impl FieldMapping {
    /// Plain mapping with `is_required` taken from the target schema.
    pub fn new(source_field: impl Into<String>, target_field: TargetField) -> Self {
        Self {
            source_field: source_field.into(),
            target_field,
            transform_type: TransformType::None,
            transform_value: String::new(),
            default_value: String::new(),
            is_required: target_field.is_required(),
        }
    }

    pub fn with_transform(mut self, transform_type: TransformType, value: impl Into<String>) -> Self {
        self.transform_type = transform_type;
        self.transform_value = value.into();
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = default_value.into();
        self
    }

    pub fn default_value(&self) -> Option<&str> {
        Some(self.default_value.as_str()).filter(|v| !v.trim().is_empty())
    }
}

// ==========================================
// FeedConfig - input for create/update
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub merchant_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source_url: String,
    pub format: FeedFormat,
    #[serde(default)]
    pub format_options: FormatOptions,
    #[serde(default)]
    pub import_mode: ImportMode,
    #[serde(default)]
    pub match_by: MatchKey,
    #[serde(default = "default_true")]
    pub import_images: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    pub field_mappings: Vec<FieldMapping>,
}

fn default_true() -> bool {
    true
}

// ==========================================
// Feed
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub description: String,
    pub source_url: String,
    pub format: FeedFormat,
    pub format_options: FormatOptions,
    pub import_mode: ImportMode,
    pub match_by: MatchKey,
    pub import_images: bool,
    pub field_mappings: Vec<FieldMapping>,
    pub active: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Products created by this feed over all runs.
    pub product_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    pub fn from_config(id: String, config: FeedConfig, now: DateTime<Utc>) -> Self {
        Self {
            id,
            merchant_id: config.merchant_id,
            name: config.name,
            description: config.description,
            source_url: config.source_url,
            format: config.format,
            format_options: config.format_options,
            import_mode: config.import_mode,
            match_by: config.match_by,
            import_images: config.import_images,
            field_mappings: config.field_mappings,
            active: config.active,
            last_run_at: None,
            product_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an edited configuration, keeping identity and run statistics.
    pub fn apply_config(&mut self, config: FeedConfig, now: DateTime<Utc>) {
        self.merchant_id = config.merchant_id;
        self.name = config.name;
        self.description = config.description;
        self.source_url = config.source_url;
        self.format = config.format;
        self.format_options = config.format_options;
        self.import_mode = config.import_mode;
        self.match_by = config.match_by;
        self.import_images = config.import_images;
        self.field_mappings = config.field_mappings;
        self.active = config.active;
        self.updated_at = now;
    }
}
