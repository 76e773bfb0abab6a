// ==========================================
// Product Feed Import - import API
// ==========================================
// Run control and observation for callers (admin UI, CLI).
// Progress reads are O(1): they return the last published snapshot.
// ==========================================

use crate::api::error::ApiResult;
use crate::domain::import_run::{ImportProgress, ImportRun};
use crate::importer::ImportOrchestrator;
use std::sync::Arc;

pub struct ImportApi {
    orchestrator: Arc<ImportOrchestrator>,
}

impl ImportApi {
    pub fn new(orchestrator: Arc<ImportOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Starts an import of the feed in the background.
    ///
    /// # Errors
    /// - `AlreadyRunning` when the feed has a run in progress
    /// - `NotFound`, `MissingRequiredMappings`, `FeedBusy`
    pub async fn start_import(&self, feed_id: &str) -> ApiResult<ImportRun> {
        Ok(self.orchestrator.start(feed_id).await?)
    }

    /// Requests cancellation; the record in flight still completes.
    ///
    /// # Errors
    /// - `NotRunning` when no run is in progress
    pub fn stop_import(&self, feed_id: &str) -> ApiResult<()> {
        Ok(self.orchestrator.stop(feed_id)?)
    }

    pub fn get_import_progress(&self, feed_id: &str) -> ApiResult<Arc<ImportProgress>> {
        Ok(self.orchestrator.progress(feed_id)?)
    }

    /// Run history of a feed, newest first.
    pub fn get_import_history(&self, feed_id: &str) -> ApiResult<Vec<ImportRun>> {
        Ok(self.orchestrator.history(feed_id)?)
    }

    /// Resolves once the feed has no run in progress, with its final snapshot.
    pub async fn wait_for_import(&self, feed_id: &str) -> ApiResult<Arc<ImportProgress>> {
        Ok(self.orchestrator.wait_for_completion(feed_id).await?)
    }
}
