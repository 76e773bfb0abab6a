// ==========================================
// Product Feed Import - configuration API
// ==========================================
// Lists and edits the global pipeline tunables (config_kv).
// Values are read once when the pipeline is built, so a change
// applies from the next start of the process.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::alias_table::AliasTable;
use crate::config::{config_keys, ConfigManager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
}

pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// Every stored override, sorted by key.
    pub fn list_configs(&self) -> ApiResult<Vec<ConfigItem>> {
        Ok(self
            .config_manager
            .get_config_snapshot()?
            .into_iter()
            .map(|(key, value)| ConfigItem { key, value })
            .collect())
    }

    pub fn get_config(&self, key: &str) -> ApiResult<Option<String>> {
        Ok(self.config_manager.get_config_value(key)?)
    }

    /// Stores an override for a known key.
    ///
    /// # Errors
    /// - `InvalidInput` for an unknown key or a value of the wrong shape
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        if !config_keys::ALL.contains(&key) {
            return Err(ApiError::InvalidInput(format!(
                "unknown config key: {} (known: {})",
                key,
                config_keys::ALL.join(", ")
            )));
        }
        let value = value.trim();
        if key == config_keys::ALIAS_TABLE {
            AliasTable::from_json(value)
                .map_err(|e| ApiError::InvalidInput(format!("{}: {}", key, e)))?;
        } else if value.parse::<u64>().is_err() {
            return Err(ApiError::InvalidInput(format!(
                "{} expects a non-negative integer, got {:?}",
                key, value
            )));
        }

        self.config_manager.set_config_value(key, value)?;
        info!(config_key = key, "config updated");
        Ok(())
    }

    /// Removes an override; the default applies again.
    pub fn reset_config(&self, key: &str) -> ApiResult<bool> {
        Ok(self.config_manager.remove_config_value(key)?)
    }
}
