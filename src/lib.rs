// ==========================================
// Product Feed Import - core library
// ==========================================
// Pulls product feeds (XML / CSV / JSON), maps source fields onto
// a fixed target schema and upserts the result into a catalog.
// Storage: SQLite
// ==========================================

// ==========================================
// Modules
// ==========================================

// Domain layer - entities and value types
pub mod domain;

// Repository layer - persistence
pub mod repository;

// Importer layer - reading, mapping, matching, run orchestration
pub mod importer;

// Configuration
pub mod config;

// Database infrastructure (connection PRAGMAs, schema bootstrap)
pub mod db;

// Logging
pub mod logging;

// API layer - operations exposed to callers
pub mod api;

// Application layer - wiring
pub mod app;

// ==========================================
// Re-exports
// ==========================================

pub use domain::types::{FeedFormat, ImportMode, LogLevel, MatchKey, RunStatus, TransformType};

pub use domain::{
    CatalogProduct, Feed, FeedConfig, FieldMapping, FormatOptions, ImportProgress, ImportRun,
    NormalizedRecord, RawRecord, TargetField,
};

pub use importer::{ImportOrchestrator, MatchResolver};

pub use api::{ApiError, ApiResult, ConfigApi, FeedApi, ImportApi};

pub use app::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Product Feed Import";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
