// ==========================================
// Product Feed Import - feed API
// ==========================================
// Configuration-time operations: preview, auto-mapping, feed CRUD
// and the target schema registry.
// Edits and deletes are refused while an import of the feed runs.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::FeedConfigValidator;
use crate::config::alias_table::AliasTable;
use crate::domain::feed::{Feed, FeedConfig, FormatOptions};
use crate::domain::target_schema::{TargetFieldSpec, TARGET_FIELDS};
use crate::domain::types::FeedFormat;
use crate::importer::{
    AutoMapper, FeedFetcher, FeedPreview, FeedSource, ImportOrchestrator, MappingSuggestion,
    SchemaInspector,
};
use crate::repository::FeedRepository;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub struct FeedApi {
    feeds: Arc<FeedRepository>,
    orchestrator: Arc<ImportOrchestrator>,
    fetcher: Arc<dyn FeedFetcher>,
}

impl FeedApi {
    pub fn new(
        feeds: Arc<FeedRepository>,
        orchestrator: Arc<ImportOrchestrator>,
        fetcher: Arc<dyn FeedFetcher>,
    ) -> Self {
        Self {
            feeds,
            orchestrator,
            fetcher,
        }
    }

    // ==========================================
    // Preview / auto-mapping
    // ==========================================

    /// Fetches a feed and reports its fields and a few sample items.
    ///
    /// Read-only: nothing is stored.
    ///
    /// # Errors
    /// - `FeedUnreachable` when the URL cannot be fetched
    /// - `FeedParseError` when the body is not a readable feed
    #[instrument(skip(self, options))]
    pub async fn preview(
        &self,
        url: &str,
        format: FeedFormat,
        options: &FormatOptions,
    ) -> ApiResult<FeedPreview> {
        if url.trim().is_empty() {
            return Err(ApiError::InvalidInput("feed URL must not be empty".to_string()));
        }
        let body = self.fetcher.fetch(url).await?;

        let settings = self.orchestrator.settings();
        let inspector = SchemaInspector::new(settings.inspect_limit, settings.sample_size);
        let options = options.clone();
        // parsing is CPU-bound, keep it off the async workers
        let preview = tokio::task::spawn_blocking(move || {
            let source = FeedSource::open(body, format, &options)?;
            inspector.preview(&source)
        })
        .await
        .map_err(|e| ApiError::InternalError(e.to_string()))??;

        info!(
            fields = preview.fields.len(),
            total = preview.total_count,
            format = %preview.detected_format,
            "feed previewed"
        );
        Ok(preview)
    }

    /// Suggested source -> target pairs for the given field names.
    pub fn auto_map(&self, fields: &[String]) -> Vec<MappingSuggestion> {
        self.auto_map_with(&self.orchestrator.settings().alias_table, fields)
    }

    pub fn auto_map_with(&self, aliases: &AliasTable, fields: &[String]) -> Vec<MappingSuggestion> {
        AutoMapper::new(aliases).suggest(fields)
    }

    /// The target schema registry, in display order.
    pub fn target_fields(&self) -> &'static [TargetFieldSpec] {
        &TARGET_FIELDS
    }

    // ==========================================
    // Feed CRUD
    // ==========================================

    #[instrument(skip(self, config), fields(merchant_id = %config.merchant_id))]
    pub fn create_feed(&self, config: FeedConfig) -> ApiResult<Feed> {
        FeedConfigValidator::validate(&config)?;

        let feed = Feed::from_config(Uuid::new_v4().to_string(), config, Utc::now());
        self.feeds.insert(&feed)?;
        info!(feed_id = %feed.id, name = %feed.name, "feed created");
        Ok(feed)
    }

    pub fn get_feed(&self, feed_id: &str) -> ApiResult<Feed> {
        self.feeds
            .find_by_id(feed_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Feed(id={})", feed_id)))
    }

    /// Feeds of one merchant, or all feeds.
    pub fn list_feeds(&self, merchant_id: Option<&str>) -> ApiResult<Vec<Feed>> {
        Ok(self.feeds.list(merchant_id)?)
    }

    /// Replaces a feed's configuration, keeping its id and statistics.
    ///
    /// # Errors
    /// - `FeedBusy` while an import of the feed is running
    /// - `NotFound`, `ValidationError`, `MissingRequiredMappings`
    #[instrument(skip(self, config))]
    pub fn update_feed(&self, feed_id: &str, config: FeedConfig) -> ApiResult<Feed> {
        FeedConfigValidator::validate(&config)?;

        let _edit = self.orchestrator.try_lock_feed_for_edit(feed_id)?;
        let mut feed = self.get_feed(feed_id)?;
        feed.apply_config(config, Utc::now());
        self.feeds.update(&feed)?;
        info!(feed_id = %feed.id, "feed updated");
        Ok(feed)
    }

    /// Deletes a feed with its mappings and run history.
    ///
    /// # Errors
    /// - `FeedBusy` while an import of the feed is running
    /// - `NotFound`
    #[instrument(skip(self))]
    pub fn delete_feed(&self, feed_id: &str) -> ApiResult<()> {
        let edit = self.orchestrator.try_lock_feed_for_edit(feed_id)?;
        self.feeds.delete(feed_id)?;
        drop(edit);
        self.orchestrator.forget_feed(feed_id)?;
        info!(feed_id = %feed_id, "feed deleted");
        Ok(())
    }
}
