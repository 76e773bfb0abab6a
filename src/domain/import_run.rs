// ==========================================
// Product Feed Import - run history and live progress
// ==========================================
// ImportRun:      durable history entry, immutable once terminal
// ImportProgress: live projection of the running ImportRun,
//                 replaced as a whole on every checkpoint
// ==========================================

use crate::domain::types::{LogLevel, RunStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ==========================================
// RunCounters
// ==========================================
// processed = created + updated + skipped + errors at every checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Outcome of a single source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Skipped,
    Error,
}

impl RunCounters {
    pub fn record(&mut self, outcome: RecordOutcome) {
        self.processed += 1;
        match outcome {
            RecordOutcome::Created => self.created += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Error => self.errors += 1,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.processed == self.created + self.updated + self.skipped + self.errors
    }
}

// ==========================================
// ImportRun - history entry
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: String,
    pub feed_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub total_items: Option<u64>,
    #[serde(flatten)]
    pub counters: RunCounters,
    /// Only set when status is failed.
    pub error_message: Option<String>,
}

impl ImportRun {
    pub fn start(id: String, feed_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            feed_id,
            started_at,
            finished_at: None,
            status: RunStatus::Running,
            total_items: None,
            counters: RunCounters::default(),
            error_message: None,
        }
    }

    pub fn duration_secs(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_seconds().max(0))
    }
}

// ==========================================
// LogLine - one entry of a run's log tail
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

// ==========================================
// ImportProgress - live projection
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub feed_id: String,
    pub run_id: Option<String>,
    pub status: RunStatus,
    pub total: Option<u64>,
    #[serde(flatten)]
    pub counters: RunCounters,
    /// 0..=100, None while the total is unknown.
    pub percent: Option<f64>,
    pub elapsed_secs: f64,
    /// Items per second since the previous checkpoint.
    pub speed: f64,
    pub eta_secs: Option<f64>,
    pub message: String,
    pub error_message: Option<String>,
    pub logs: VecDeque<LogLine>,
    pub updated_at: DateTime<Utc>,
}

impl ImportProgress {
    /// Progress of a feed with no run in flight.
    pub fn idle(feed_id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            run_id: None,
            status: RunStatus::Idle,
            total: None,
            counters: RunCounters::default(),
            percent: None,
            elapsed_secs: 0.0,
            speed: 0.0,
            eta_secs: None,
            message: String::new(),
            error_message: None,
            logs: VecDeque::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }
}
