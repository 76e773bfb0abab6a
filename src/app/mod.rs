// ==========================================
// Product Feed Import - application layer
// ==========================================
// Process-level wiring shared by the CLI and embedders.
// ==========================================

pub mod state;

// Re-exports
pub use state::{get_default_db_path, AppState, DB_PATH_ENV};
