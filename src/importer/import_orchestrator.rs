// ==========================================
// Product Feed Import - import orchestrator
// ==========================================
// Owns the lifecycle of import runs:
//   idle -> running -> {completed | failed | cancelled}
// Flow per run: fetch -> parse/count -> per record
//   (map -> resolve/write -> count -> log) -> checkpoint -> finish
//
// One run per feed at a time. A running import holds the feed's
// read lock, so feed edits and deletes are refused until it ends.
// Cancellation is checked once per record, before the next record
// is pulled; the record in flight always completes.
// ==========================================

use crate::config::pipeline_config_trait::PipelineSettings;
use crate::domain::feed::Feed;
use crate::domain::import_run::{ImportProgress, ImportRun, RecordOutcome};
use crate::domain::record::RawRecord;
use crate::domain::types::{LogLevel, RunStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::feed_parser::FeedSource;
use crate::importer::field_mapper::FieldMapper;
use crate::importer::importer_trait::FeedFetcher;
use crate::importer::match_resolver::{strip_images, MatchResolver, UpsertOutcome};
use crate::importer::progress::ProgressTracker;
use crate::repository::error::RepositoryError;
use crate::repository::{FeedRepository, ImportRunRepository, ProgressStore};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Error message of a run whose task stopped without closing it.
pub const ABANDONED_MESSAGE: &str = "import task stopped unexpectedly";

/// How a run that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Completed,
    Cancelled,
}

struct ActiveRun {
    run_id: String,
    cancel: CancellationToken,
    finished: CancellationToken,
}

/// Frees the feed's entry in the active-run map when the run task ends.
///
/// A task that ends without closing its run (panic, runtime shutdown)
/// leaves the run failed with its last checkpointed counters.
struct RunSlot {
    orchestrator: Arc<ImportOrchestrator>,
    feed_id: String,
    run_id: String,
    closed: bool,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        if !self.closed {
            self.orchestrator.abandon_run(&self.feed_id, &self.run_id);
        }
        let mut active = self
            .orchestrator
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        active.remove(&self.feed_id);
    }
}

// ==========================================
// ImportOrchestrator
// ==========================================
pub struct ImportOrchestrator {
    feeds: Arc<FeedRepository>,
    runs: Arc<ImportRunRepository>,
    progress: Arc<ProgressStore>,
    fetcher: Arc<dyn FeedFetcher>,
    resolver: Arc<MatchResolver>,
    settings: PipelineSettings,
    active: Mutex<HashMap<String, ActiveRun>>,
    feed_locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl ImportOrchestrator {
    pub fn new(
        feeds: Arc<FeedRepository>,
        runs: Arc<ImportRunRepository>,
        progress: Arc<ProgressStore>,
        fetcher: Arc<dyn FeedFetcher>,
        resolver: Arc<MatchResolver>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            feeds,
            runs,
            progress,
            fetcher,
            resolver,
            settings,
            active: Mutex::new(HashMap::new()),
            feed_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    fn active_runs(&self) -> ImportResult<MutexGuard<'_, HashMap<String, ActiveRun>>> {
        Ok(self.active.lock().map_err(RepositoryError::lock)?)
    }

    fn feed_lock(&self, feed_id: &str) -> ImportResult<Arc<RwLock<()>>> {
        let mut locks = self.feed_locks.lock().map_err(RepositoryError::lock)?;
        Ok(locks
            .entry(feed_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone())
    }

    /// Exclusive access to a feed's configuration for editing.
    ///
    /// # Errors
    /// - `FeedBusy` while an import of the feed is running
    pub fn try_lock_feed_for_edit(&self, feed_id: &str) -> ImportResult<OwnedRwLockWriteGuard<()>> {
        self.feed_lock(feed_id)?
            .try_write_owned()
            .map_err(|_| ImportError::FeedBusy(feed_id.to_string()))
    }

    /// Drops the lock entry of a deleted feed.
    pub fn forget_feed(&self, feed_id: &str) -> ImportResult<()> {
        let mut locks = self.feed_locks.lock().map_err(RepositoryError::lock)?;
        locks.remove(feed_id);
        self.progress.clear(feed_id)?;
        Ok(())
    }

    pub fn is_running(&self, feed_id: &str) -> ImportResult<bool> {
        Ok(self.active_runs()?.contains_key(feed_id))
    }

    // ==========================================
    // start / stop
    // ==========================================

    /// Starts an import of the feed in the background.
    ///
    /// Returns the freshly created run (status `running`).
    ///
    /// # Errors
    /// - `FeedNotFound`, `FeedInactive`
    /// - `MissingRequiredMappings` / `InvalidMapping` for a bad mapping list
    /// - `AlreadyRunning` when the feed has a run in progress
    /// - `FeedBusy` when the feed is being edited
    #[instrument(skip(self), fields(run_id))]
    pub async fn start(self: &Arc<Self>, feed_id: &str) -> ImportResult<ImportRun> {
        // the read lock is held from the config read to the end of the run
        let feed_guard = self
            .feed_lock(feed_id)?
            .try_read_owned()
            .map_err(|_| ImportError::FeedBusy(feed_id.to_string()))?;

        let feed = self
            .feeds
            .find_by_id(feed_id)?
            .ok_or_else(|| ImportError::FeedNotFound(feed_id.to_string()))?;
        if !feed.active {
            return Err(ImportError::FeedInactive(feed_id.to_string()));
        }
        FieldMapper::validate_mappings(&feed.field_mappings)?;

        let mut active = self.active_runs()?;
        if active.contains_key(feed_id) {
            return Err(ImportError::AlreadyRunning(feed_id.to_string()));
        }

        let run = ImportRun::start(Uuid::new_v4().to_string(), feed.id.clone(), Utc::now());
        self.runs.insert(&run)?;
        tracing::Span::current().record("run_id", run.id.as_str());

        let mut tracker = ProgressTracker::new(
            feed.id.clone(),
            run.id.clone(),
            self.settings.log_tail_size,
            self.settings.checkpoint_interval,
        );
        tracker.log(LogLevel::Info, format!("Import started: {}", feed.name));
        self.progress.replace(tracker.snapshot(RunStatus::Running, None))?;

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        active.insert(
            feed.id.clone(),
            ActiveRun {
                run_id: run.id.clone(),
                cancel: cancel.clone(),
                finished: finished.clone(),
            },
        );
        drop(active);

        info!(feed_id = %feed.id, run_id = %run.id, "import started");
        let this = Arc::clone(self);
        let run_id = run.id.clone();
        tokio::spawn(async move {
            // dropped in reverse order, panics included:
            // the run slot is released first, then `finished` fires
            let _finished = finished.drop_guard();
            let mut slot = RunSlot {
                orchestrator: Arc::clone(&this),
                feed_id: feed.id.clone(),
                run_id: run_id.clone(),
                closed: false,
            };
            this.execute(feed, run_id, tracker, cancel, feed_guard).await;
            slot.closed = true;
        });

        Ok(run)
    }

    /// Requests cooperative cancellation of the feed's running import.
    ///
    /// # Errors
    /// - `NotRunning` when no run is in progress
    #[instrument(skip(self))]
    pub fn stop(&self, feed_id: &str) -> ImportResult<()> {
        let active = self.active_runs()?;
        let run = active
            .get(feed_id)
            .ok_or_else(|| ImportError::NotRunning(feed_id.to_string()))?;
        info!(run_id = %run.run_id, "stop requested");
        run.cancel.cancel();
        Ok(())
    }

    /// Waits until the feed has no run in progress.
    pub async fn wait_for_completion(&self, feed_id: &str) -> ImportResult<Arc<ImportProgress>> {
        let finished = self
            .active_runs()?
            .get(feed_id)
            .map(|run| run.finished.clone());
        if let Some(finished) = finished {
            finished.cancelled().await;
        }
        self.progress(feed_id)
    }

    // ==========================================
    // queries
    // ==========================================

    /// Latest progress snapshot, or an idle one when nothing ran yet.
    pub fn progress(&self, feed_id: &str) -> ImportResult<Arc<ImportProgress>> {
        Ok(self
            .progress
            .get(feed_id)?
            .unwrap_or_else(|| Arc::new(ImportProgress::idle(feed_id))))
    }

    /// Run history of a feed, newest first.
    pub fn history(&self, feed_id: &str) -> ImportResult<Vec<ImportRun>> {
        Ok(self.runs.list_by_feed(feed_id, self.settings.history_limit)?)
    }

    /// Closes runs left `running` by a previous process.
    ///
    /// Call once at start-up, before any import is started.
    pub fn reconcile_interrupted_runs(&self) -> ImportResult<Vec<String>> {
        let closed = self.runs.mark_interrupted(Utc::now())?;
        for run_id in &closed {
            warn!(run_id = %run_id, "run was interrupted by a restart, marked failed");
        }
        Ok(closed)
    }

    // ==========================================
    // run execution
    // ==========================================

    async fn execute(
        self: Arc<Self>,
        feed: Feed,
        run_id: String,
        mut tracker: ProgressTracker,
        cancel: CancellationToken,
        feed_guard: OwnedRwLockReadGuard<()>,
    ) {
        let result = self.run_pipeline(&feed, &run_id, &mut tracker, &cancel).await;

        let (status, error_message) = match result {
            Ok(RunEnd::Completed) => (RunStatus::Completed, None),
            Ok(RunEnd::Cancelled) => (RunStatus::Cancelled, None),
            Err(e) => {
                error!(feed_id = %feed.id, run_id = %run_id, error = %e, "import failed");
                (RunStatus::Failed, Some(e.to_string()))
            }
        };
        self.finish(&feed, &run_id, &mut tracker, status, error_message);
        drop(feed_guard);
    }

    async fn run_pipeline(
        &self,
        feed: &Feed,
        run_id: &str,
        tracker: &mut ProgressTracker,
        cancel: &CancellationToken,
    ) -> ImportResult<RunEnd> {
        // === Step 1: fetch ===
        tracker.log(LogLevel::Info, format!("Downloading {}", feed.source_url));
        let body = self.fetcher.fetch(&feed.source_url).await?;
        debug!(bytes = body.len(), "feed downloaded");

        // === Step 2: open and count ===
        let source = FeedSource::open(body, feed.format, &feed.format_options)?;
        if source.format() != feed.format {
            tracker.log(
                LogLevel::Warning,
                format!(
                    "Feed is configured as {} but looks like {}, reading it as {}",
                    feed.format,
                    source.format(),
                    source.format()
                ),
            );
        }
        if source.item_path_detected() {
            tracker.log(
                LogLevel::Warning,
                format!(
                    "Item element not found, using detected '{}'",
                    source.item_path().unwrap_or_default()
                ),
            );
        }
        let total = source.count()?;
        tracker.set_total(total);
        tracker.log(LogLevel::Info, format!("Found {} items", total));
        self.checkpoint(run_id, tracker)?;
        info!(feed_id = %feed.id, total, "feed parsed");

        // === Step 3: records ===
        let mut records = source.records()?;
        loop {
            if cancel.is_cancelled() {
                return Ok(RunEnd::Cancelled);
            }
            let Some(item) = records.next() else {
                break;
            };
            let index = tracker.counters().processed + 1;

            let outcome = match item? {
                Ok(raw) => self.process_record(feed, &raw, index, tracker).await,
                Err(record_error) => {
                    tracker.log(LogLevel::Error, format!("Item {}: {}", index, record_error));
                    RecordOutcome::Error
                }
            };
            tracker.record(outcome);

            let processed = tracker.counters().processed;
            if processed % self.settings.milestone_every.max(1) == 0 {
                tracker.log(
                    LogLevel::Info,
                    format!("Processed {} / {}", processed, total),
                );
            }
            if tracker.checkpoint_due() {
                self.checkpoint(run_id, tracker)?;
            }
        }

        Ok(RunEnd::Completed)
    }

    /// Maps and applies one raw record. Never fails the run.
    async fn process_record(
        &self,
        feed: &Feed,
        raw: &RawRecord,
        index: u64,
        tracker: &mut ProgressTracker,
    ) -> RecordOutcome {
        let (mut record, field_errors) = FieldMapper::apply(raw, &feed.field_mappings);
        if !field_errors.is_empty() {
            let details: Vec<String> = field_errors.iter().map(ToString::to_string).collect();
            tracker.log(LogLevel::Error, format!("Item {}: {}", index, details.join("; ")));
            return RecordOutcome::Error;
        }
        if !feed.import_images {
            strip_images(&mut record);
        }

        match self
            .resolver
            .upsert(&record, feed.match_by, feed.import_mode, &feed.id)
            .await
        {
            Ok(upsert) => {
                if upsert.matched > 1 {
                    tracker.log(
                        LogLevel::Warning,
                        format!(
                            "Item {}: {} products share the same {}, updated the most recent one",
                            index, upsert.matched, feed.match_by
                        ),
                    );
                }
                match &upsert.outcome {
                    UpsertOutcome::Skipped(reason) => {
                        tracker.log(LogLevel::Info, format!("Item {} skipped: {}", index, reason))
                    }
                    UpsertOutcome::Invalid(message) => {
                        tracker.log(LogLevel::Error, format!("Item {}: {}", index, message))
                    }
                    UpsertOutcome::Created(_) | UpsertOutcome::Updated(_) => {}
                }
                upsert.outcome.record_outcome()
            }
            Err(e) => {
                warn!(feed_id = %feed.id, index, error = %e, "catalog write failed");
                tracker.log(
                    LogLevel::Error,
                    format!("Item {}: catalog write failed: {}", index, e),
                );
                RecordOutcome::Error
            }
        }
    }

    /// Persists counters and publishes a fresh progress snapshot.
    fn checkpoint(&self, run_id: &str, tracker: &mut ProgressTracker) -> ImportResult<()> {
        let snapshot = tracker.snapshot(RunStatus::Running, None);
        self.runs
            .update_checkpoint(run_id, snapshot.total, &snapshot.counters)?;
        self.progress.replace(snapshot)?;
        Ok(())
    }

    /// Fails a run whose task ended before `finish`.
    fn abandon_run(&self, feed_id: &str, run_id: &str) {
        error!(feed_id = %feed_id, run_id = %run_id, "import task ended abnormally");
        let now = Utc::now();

        match self.runs.find_by_id(run_id) {
            Ok(Some(run)) if run.status == RunStatus::Running => {
                if let Err(e) = self.runs.finish(
                    run_id,
                    RunStatus::Failed,
                    now,
                    run.total_items,
                    &run.counters,
                    Some(ABANDONED_MESSAGE),
                ) {
                    error!(run_id = %run_id, error = %e, "cannot close import run");
                }
            }
            Ok(_) => {}
            Err(e) => error!(run_id = %run_id, error = %e, "cannot load import run"),
        }

        let current = self.progress.get(feed_id).ok().flatten();
        if let Some(current) = current.filter(|p| p.is_running() && p.run_id.as_deref() == Some(run_id)) {
            let mut snapshot = (*current).clone();
            snapshot.status = RunStatus::Failed;
            snapshot.eta_secs = None;
            snapshot.message = format!("Failed: {}", ABANDONED_MESSAGE);
            snapshot.error_message = Some(ABANDONED_MESSAGE.to_string());
            snapshot.updated_at = now;
            if let Err(e) = self.progress.replace(snapshot) {
                error!(feed_id = %feed_id, error = %e, "cannot publish final progress");
            }
        }
    }

    /// Closes the run row, stamps the feed and publishes the terminal snapshot.
    fn finish(
        &self,
        feed: &Feed,
        run_id: &str,
        tracker: &mut ProgressTracker,
        status: RunStatus,
        error_message: Option<String>,
    ) {
        let now = Utc::now();
        let counters = tracker.counters();
        match status {
            RunStatus::Failed => tracker.log(
                LogLevel::Error,
                format!(
                    "Import failed: {}",
                    error_message.as_deref().unwrap_or("unknown error")
                ),
            ),
            RunStatus::Cancelled => tracker.log(
                LogLevel::Warning,
                format!("Import cancelled after {} items", counters.processed),
            ),
            _ => tracker.log(LogLevel::Info, "Import completed"),
        }

        if let Err(e) = self.runs.finish(
            run_id,
            status,
            now,
            tracker.total(),
            &counters,
            error_message.as_deref(),
        ) {
            error!(run_id = %run_id, error = %e, "cannot close import run");
        }
        if let Err(e) = self.feeds.record_run(&feed.id, now, counters.created) {
            warn!(feed_id = %feed.id, error = %e, "cannot stamp feed run statistics");
        }

        let snapshot = tracker.snapshot(status, error_message.as_deref());
        if let Err(e) = self.progress.replace(snapshot) {
            error!(feed_id = %feed.id, error = %e, "cannot publish final progress");
        }

        info!(
            feed_id = %feed.id,
            run_id = %run_id,
            status = %status,
            processed = counters.processed,
            created = counters.created,
            updated = counters.updated,
            skipped = counters.skipped,
            errors = counters.errors,
            "import finished"
        );
    }
}
