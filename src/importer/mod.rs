// ==========================================
// Product Feed Import - importer layer
// ==========================================
// Source Reader -> Mapping Engine -> Matching & Upsert -> Orchestrator
// Supported sources: XML, CSV, JSON over http(s) or local files
// ==========================================

pub mod auto_mapper;
pub mod data_cleaner;
pub mod error;
pub mod feed_fetcher;
pub mod feed_parser;
pub mod field_mapper;
pub mod import_orchestrator;
pub mod importer_trait;
pub mod match_resolver;
pub mod progress;
pub mod schema_inspector;

pub use auto_mapper::{AutoMapper, MappingSuggestion};
pub use data_cleaner::DataCleaner;
pub use error::{ImportError, ImportResult};
pub use feed_fetcher::HttpFeedFetcher;
pub use feed_parser::FeedSource;
pub use field_mapper::FieldMapper;
pub use import_orchestrator::ImportOrchestrator;
pub use importer_trait::{CatalogStore, FeedFetcher};
pub use match_resolver::{MatchAction, MatchResolver, SkipReason, UpsertOutcome};
pub use progress::ProgressTracker;
pub use schema_inspector::{FeedPreview, SchemaInspector};
