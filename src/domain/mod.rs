// ==========================================
// Product Feed Import - domain layer
// ==========================================
// Entities and value types shared by every layer.
// No data access, no pipeline logic.
// ==========================================

pub mod feed;
pub mod import_run;
pub mod product;
pub mod record;
pub mod target_schema;
pub mod types;

// Re-export core types
pub use feed::{FeedConfig, FieldMapping, FormatOptions, Feed};
pub use import_run::{ImportProgress, ImportRun, LogLine, RecordOutcome, RunCounters};
pub use product::CatalogProduct;
pub use record::{FieldError, FieldErrorKind, FieldValue, NormalizedRecord, RawRecord, RecordError};
pub use target_schema::{TargetField, TargetFieldSpec, ValueKind, TARGET_FIELDS, TARGET_SCHEMA_VERSION};
pub use types::{
    FeedFormat, ImportMode, LogLevel, MatchKey, RunStatus, TransformType, UnknownVariant,
};
