// ==========================================
// Product Feed Import - application state
// ==========================================
// Wires repositories, engines and APIs over one shared SQLite
// connection, and reconciles runs a previous process left open.
// ==========================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{ConfigApi, FeedApi, ImportApi};
use crate::config::{ConfigManager, PipelineConfigReader};
use crate::db::open_shared;
use crate::importer::{FeedFetcher, HttpFeedFetcher, ImportOrchestrator, MatchResolver};
use crate::repository::{
    FeedRepository, ImportRunRepository, ProgressStore, SqliteCatalogRepository,
};

/// Environment variable overriding the database location.
pub const DB_PATH_ENV: &str = "FEED_IMPORT_DB_PATH";

pub struct AppState {
    pub db_path: String,

    pub feed_api: Arc<FeedApi>,
    pub import_api: Arc<ImportApi>,
    pub config_api: Arc<ConfigApi>,

    /// Reference catalog the pipeline writes into.
    pub catalog: Arc<SqliteCatalogRepository>,
    pub orchestrator: Arc<ImportOrchestrator>,

    /// Runs closed as interrupted during start-up.
    pub reconciled_runs: Vec<String>,
}

impl AppState {
    /// Opens (and bootstraps) the database and builds every component.
    ///
    /// Feeds are fetched over HTTP(S) or from local paths.
    pub async fn new(db_path: String) -> Result<Self, String> {
        Self::build(db_path, None).await
    }

    /// Same as `new`, with a caller-provided fetcher.
    pub async fn with_fetcher(db_path: String, fetcher: Arc<dyn FeedFetcher>) -> Result<Self, String> {
        Self::build(db_path, Some(fetcher)).await
    }

    async fn build(db_path: String, fetcher: Option<Arc<dyn FeedFetcher>>) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "initializing AppState");

        let conn = open_shared(&db_path).map_err(|e| format!("cannot open database {}: {}", db_path, e))?;

        // ==========================================
        // Configuration
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("cannot create ConfigManager: {}", e))?,
        );
        let settings = config_manager
            .load_settings()
            .await
            .map_err(|e| format!("cannot load pipeline settings: {}", e))?;

        // ==========================================
        // Repositories
        // ==========================================
        let feed_repo = Arc::new(FeedRepository::from_connection(conn.clone()));
        let run_repo = Arc::new(ImportRunRepository::from_connection(conn.clone()));
        let catalog = Arc::new(SqliteCatalogRepository::from_connection(conn.clone()));
        let progress_store = Arc::new(ProgressStore::new());

        // ==========================================
        // Engines
        // ==========================================
        let fetcher: Arc<dyn FeedFetcher> = match fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(
                HttpFeedFetcher::new(settings.fetch_timeout, settings.fetch_max_bytes)
                    .map_err(|e| format!("cannot create feed fetcher: {}", e))?,
            ),
        };
        let resolver = Arc::new(MatchResolver::new(catalog.clone()));
        let orchestrator = Arc::new(ImportOrchestrator::new(
            feed_repo.clone(),
            run_repo,
            progress_store,
            fetcher.clone(),
            resolver,
            settings,
        ));

        let reconciled_runs = orchestrator
            .reconcile_interrupted_runs()
            .map_err(|e| format!("cannot reconcile interrupted runs: {}", e))?;
        if !reconciled_runs.is_empty() {
            tracing::warn!(count = reconciled_runs.len(), "closed runs interrupted by a restart");
        }

        // ==========================================
        // APIs
        // ==========================================
        let feed_api = Arc::new(FeedApi::new(feed_repo, orchestrator.clone(), fetcher));
        let import_api = Arc::new(ImportApi::new(orchestrator.clone()));
        let config_api = Arc::new(ConfigApi::new(config_manager));

        tracing::info!("AppState initialized");

        Ok(Self {
            db_path,
            feed_api,
            import_api,
            config_api,
            catalog,
            orchestrator,
            reconciled_runs,
        })
    }

    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// Default database path
// ==========================================

/// `FEED_IMPORT_DB_PATH` when set, otherwise
/// `<user data dir>/feed-import/feed_import.db` (or `./feed_import.db`
/// when no data dir is known).
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./feed_import.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("feed-import");
        // best-effort: opening the database reports the real error
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("feed_import.db");
        }
    }
    path.to_string_lossy().to_string()
}
