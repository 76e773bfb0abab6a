// ==========================================
// Product Feed Import - configuration layer
// ==========================================
// Runtime tunables in the config_kv table, with defaults,
// plus the auto-mapping alias table (editable JSON data).
// ==========================================

pub mod alias_table;
pub mod config_manager;
pub mod pipeline_config_trait;

pub use alias_table::AliasTable;
pub use config_manager::{config_keys, ConfigManager};
pub use pipeline_config_trait::{PipelineConfigReader, PipelineSettings};
