// ==========================================
// Product Feed Import - API layer
// ==========================================
// Operations exposed to callers (admin UI, automation, CLI).
// ==========================================

pub mod config_api;
pub mod error;
pub mod feed_api;
pub mod import_api;
pub mod validator;

// Re-exports
pub use config_api::{ConfigApi, ConfigItem};
pub use error::{ApiError, ApiResult};
pub use feed_api::FeedApi;
pub use import_api::ImportApi;
pub use validator::{FeedConfigValidator, ValidationViolation};
