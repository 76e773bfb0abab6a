// ==========================================
// Product Feed Import - configuration manager
// ==========================================
// Storage: config_kv table (scope_id = 'global')
// Loads, overrides and snapshots pipeline tunables.
// ==========================================

use crate::config::alias_table::AliasTable;
use crate::config::pipeline_config_trait::*;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Wraps a shared connection; PRAGMAs are re-applied (idempotent).
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn.lock().map_err(RepositoryError::lock)?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(RepositoryError::lock)
    }

    /// Raw value of a global key.
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Stores (or replaces) a global key.
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_config_value(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let removed = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
        )?;
        Ok(removed > 0)
    }

    /// All global keys, sorted.
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Parsed value of `key`, or `default` when absent or unparsable.
    fn get_parsed_or<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr,
    {
        match self.get_config_value(key)? {
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "invalid config value, using default");
                    Ok(default)
                }
            },
            None => Ok(default),
        }
    }
}

// ==========================================
// PipelineConfigReader implementation
// ==========================================
#[async_trait]
impl PipelineConfigReader for ConfigManager {
    async fn get_checkpoint_interval(&self) -> RepositoryResult<Duration> {
        let ms = self.get_parsed_or(config_keys::CHECKPOINT_INTERVAL_MS, DEFAULT_CHECKPOINT_INTERVAL_MS)?;
        Ok(Duration::from_millis(ms))
    }

    async fn get_log_tail_size(&self) -> RepositoryResult<usize> {
        let size = self.get_parsed_or(config_keys::LOG_TAIL_SIZE, DEFAULT_LOG_TAIL_SIZE)?;
        Ok(size.max(1))
    }

    async fn get_milestone_every(&self) -> RepositoryResult<u64> {
        let every = self.get_parsed_or(config_keys::MILESTONE_EVERY, DEFAULT_MILESTONE_EVERY)?;
        Ok(every.max(1))
    }

    async fn get_inspect_limit(&self) -> RepositoryResult<usize> {
        let limit = self.get_parsed_or(config_keys::INSPECT_LIMIT, DEFAULT_INSPECT_LIMIT)?;
        Ok(limit.max(1))
    }

    async fn get_sample_size(&self) -> RepositoryResult<usize> {
        self.get_parsed_or(config_keys::SAMPLE_SIZE, DEFAULT_SAMPLE_SIZE)
    }

    async fn get_fetch_timeout(&self) -> RepositoryResult<Duration> {
        let secs = self.get_parsed_or(config_keys::FETCH_TIMEOUT_SECS, DEFAULT_FETCH_TIMEOUT_SECS)?;
        Ok(Duration::from_secs(secs.max(1)))
    }

    async fn get_fetch_max_bytes(&self) -> RepositoryResult<u64> {
        self.get_parsed_or(config_keys::FETCH_MAX_BYTES, DEFAULT_FETCH_MAX_BYTES)
    }

    async fn get_history_limit(&self) -> RepositoryResult<Option<usize>> {
        let limit: usize = self.get_parsed_or(config_keys::HISTORY_LIMIT, DEFAULT_HISTORY_LIMIT)?;
        Ok((limit > 0).then_some(limit))
    }

    async fn get_alias_table(&self) -> RepositoryResult<AliasTable> {
        let Some(raw) = self.get_config_value(config_keys::ALIAS_TABLE)? else {
            return Ok(AliasTable::builtin());
        };
        match AliasTable::from_json(&raw) {
            Ok(table) => Ok(table),
            Err(e) => {
                tracing::warn!(
                    config_key = config_keys::ALIAS_TABLE,
                    error = %e,
                    "alias table is not valid JSON, using the built-in table"
                );
                Ok(AliasTable::builtin())
            }
        }
    }
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    // import run
    pub const CHECKPOINT_INTERVAL_MS: &str = "import.checkpoint_interval_ms";
    pub const LOG_TAIL_SIZE: &str = "import.log_tail_size";
    pub const MILESTONE_EVERY: &str = "import.milestone_every";
    pub const HISTORY_LIMIT: &str = "import.history_limit";

    // preview
    pub const INSPECT_LIMIT: &str = "preview.inspect_limit";
    pub const SAMPLE_SIZE: &str = "preview.sample_size";

    // fetch
    pub const FETCH_TIMEOUT_SECS: &str = "fetch.timeout_secs";
    pub const FETCH_MAX_BYTES: &str = "fetch.max_bytes";

    // auto-mapping (JSON)
    pub const ALIAS_TABLE: &str = "auto_mapping.alias_table";

    pub const ALL: [&str; 9] = [
        CHECKPOINT_INTERVAL_MS,
        LOG_TAIL_SIZE,
        MILESTONE_EVERY,
        HISTORY_LIMIT,
        INSPECT_LIMIT,
        SAMPLE_SIZE,
        FETCH_TIMEOUT_SECS,
        FETCH_MAX_BYTES,
        ALIAS_TABLE,
    ];
}
