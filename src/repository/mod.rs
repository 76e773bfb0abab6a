// ==========================================
// Product Feed Import - repository layer
// ==========================================
// Data access only, no business rules.
// All SQL is parameterized.
// ==========================================

pub mod catalog_repo;
pub mod error;
pub mod feed_repo;
pub mod import_run_repo;
pub mod progress_store;

pub use catalog_repo::SqliteCatalogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use feed_repo::FeedRepository;
pub use import_run_repo::ImportRunRepository;
pub use progress_store::ProgressStore;
