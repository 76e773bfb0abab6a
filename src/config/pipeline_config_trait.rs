// ==========================================
// Product Feed Import - pipeline configuration reader
// ==========================================
// Read-only interface the importer depends on.
// Implementor: ConfigManager (config_kv table, global scope)
// Every getter falls back to its default when the key is absent
// or the stored value does not parse.
// ==========================================

use crate::config::alias_table::AliasTable;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use std::time::Duration;

// ==========================================
// Defaults
// ==========================================
pub const DEFAULT_CHECKPOINT_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_LOG_TAIL_SIZE: usize = 100;
pub const DEFAULT_MILESTONE_EVERY: u64 = 1_000;
pub const DEFAULT_INSPECT_LIMIT: usize = 100;
pub const DEFAULT_SAMPLE_SIZE: usize = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_FETCH_MAX_BYTES: u64 = 256 * 1024 * 1024;
/// 0 = every run.
pub const DEFAULT_HISTORY_LIMIT: usize = 0;

/// All tunables of one pipeline instance, read once at start-up.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub checkpoint_interval: Duration,
    pub log_tail_size: usize,
    pub milestone_every: u64,
    pub inspect_limit: usize,
    pub sample_size: usize,
    pub fetch_timeout: Duration,
    pub fetch_max_bytes: u64,
    /// Cap on runs returned by a history query, None = all runs.
    pub history_limit: Option<usize>,
    pub alias_table: AliasTable,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            checkpoint_interval: Duration::from_millis(DEFAULT_CHECKPOINT_INTERVAL_MS),
            log_tail_size: DEFAULT_LOG_TAIL_SIZE,
            milestone_every: DEFAULT_MILESTONE_EVERY,
            inspect_limit: DEFAULT_INSPECT_LIMIT,
            sample_size: DEFAULT_SAMPLE_SIZE,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            fetch_max_bytes: DEFAULT_FETCH_MAX_BYTES,
            history_limit: None,
            alias_table: AliasTable::builtin(),
        }
    }
}

// ==========================================
// PipelineConfigReader Trait
// ==========================================
#[async_trait]
pub trait PipelineConfigReader: Send + Sync {
    // ===== Import run =====

    /// Time between progress checkpoints. Default 1000 ms.
    async fn get_checkpoint_interval(&self) -> RepositoryResult<Duration>;

    /// Lines kept in a run's log tail. Default 100.
    async fn get_log_tail_size(&self) -> RepositoryResult<usize>;

    /// Records between "processed N" milestone log lines. Default 1000.
    async fn get_milestone_every(&self) -> RepositoryResult<u64>;

    // ===== Preview =====

    /// Records scanned for field discovery. Default 100.
    async fn get_inspect_limit(&self) -> RepositoryResult<usize>;

    /// Raw records returned as preview samples. Default 10.
    async fn get_sample_size(&self) -> RepositoryResult<usize>;

    // ===== Fetch =====

    async fn get_fetch_timeout(&self) -> RepositoryResult<Duration>;

    async fn get_fetch_max_bytes(&self) -> RepositoryResult<u64>;

    // ===== History / auto-mapping =====

    /// Cap on runs returned by a history query. Default 0 (no cap).
    async fn get_history_limit(&self) -> RepositoryResult<Option<usize>>;

    /// Stored alias table, or the built-in one.
    async fn get_alias_table(&self) -> RepositoryResult<AliasTable>;

    async fn load_settings(&self) -> RepositoryResult<PipelineSettings> {
        Ok(PipelineSettings {
            checkpoint_interval: self.get_checkpoint_interval().await?,
            log_tail_size: self.get_log_tail_size().await?,
            milestone_every: self.get_milestone_every().await?,
            inspect_limit: self.get_inspect_limit().await?,
            sample_size: self.get_sample_size().await?,
            fetch_timeout: self.get_fetch_timeout().await?,
            fetch_max_bytes: self.get_fetch_max_bytes().await?,
            history_limit: self.get_history_limit().await?,
            alias_table: self.get_alias_table().await?,
        })
    }
}
