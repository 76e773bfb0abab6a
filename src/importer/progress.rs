// ==========================================
// Product Feed Import - run progress tracker
// ==========================================
// Owned by one running import. Accumulates counters and the log
// tail, and renders a full ImportProgress snapshot on demand.
// ==========================================

use crate::domain::import_run::{ImportProgress, LogLine, RecordOutcome, RunCounters};
use crate::domain::types::{LogLevel, RunStatus};
use chrono::Utc;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub struct ProgressTracker {
    feed_id: String,
    run_id: String,
    total: Option<u64>,
    counters: RunCounters,
    logs: VecDeque<LogLine>,
    log_capacity: usize,
    started: Instant,
    checkpoint_interval: Duration,
    last_checkpoint: Instant,
    last_checkpoint_processed: u64,
    speed: f64,
}

impl ProgressTracker {
    pub fn new(
        feed_id: impl Into<String>,
        run_id: impl Into<String>,
        log_capacity: usize,
        checkpoint_interval: Duration,
    ) -> Self {
        let now = Instant::now();
        Self {
            feed_id: feed_id.into(),
            run_id: run_id.into(),
            total: None,
            counters: RunCounters::default(),
            logs: VecDeque::with_capacity(log_capacity.min(1024)),
            log_capacity: log_capacity.max(1),
            started: now,
            checkpoint_interval,
            last_checkpoint: now,
            last_checkpoint_processed: 0,
            speed: 0.0,
        }
    }

    pub fn set_total(&mut self, total: u64) {
        self.total = Some(total);
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        self.counters.record(outcome);
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if self.logs.len() == self.log_capacity {
            self.logs.pop_front();
        }
        self.logs.push_back(LogLine {
            time: Utc::now(),
            level,
            message: message.into(),
        });
    }

    pub fn checkpoint_due(&self) -> bool {
        self.last_checkpoint.elapsed() >= self.checkpoint_interval
    }

    /// Renders the current state and starts a new speed window.
    pub fn snapshot(&mut self, status: RunStatus, error_message: Option<&str>) -> ImportProgress {
        let now = Instant::now();
        let window = now.duration_since(self.last_checkpoint).as_secs_f64();
        let delta = self.counters.processed - self.last_checkpoint_processed;
        if window > 0.001 {
            self.speed = delta as f64 / window;
        }
        self.last_checkpoint = now;
        self.last_checkpoint_processed = self.counters.processed;

        let processed = self.counters.processed;
        let percent = self.total.map(|total| {
            if total == 0 {
                100.0
            } else {
                (processed as f64 / total as f64 * 100.0).min(100.0)
            }
        });
        let eta_secs = match (status, self.total) {
            (RunStatus::Running, Some(total)) if self.speed > 0.0 => {
                Some(total.saturating_sub(processed) as f64 / self.speed)
            }
            _ => None,
        };

        ImportProgress {
            feed_id: self.feed_id.clone(),
            run_id: Some(self.run_id.clone()),
            status,
            total: self.total,
            counters: self.counters,
            percent,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            speed: self.speed,
            eta_secs,
            message: self.message(status, error_message),
            error_message: error_message.map(str::to_string),
            logs: self.logs.clone(),
            updated_at: Utc::now(),
        }
    }

    fn message(&self, status: RunStatus, error_message: Option<&str>) -> String {
        let c = &self.counters;
        match status {
            RunStatus::Idle => String::new(),
            RunStatus::Running => match self.total {
                Some(total) => format!("Importing {} / {}", c.processed, total),
                None => "Downloading feed".to_string(),
            },
            RunStatus::Completed => format!(
                "Completed: {} created, {} updated, {} skipped, {} errors",
                c.created, c.updated, c.skipped, c.errors
            ),
            RunStatus::Failed => format!("Failed: {}", error_message.unwrap_or("unknown error")),
            RunStatus::Cancelled => format!("Cancelled after {} items", c.processed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_CHECKPOINT_INTERVAL: Duration = Duration::from_millis(1000);

    #[test]
    fn test_log_tail_is_bounded() {
        let mut tracker = ProgressTracker::new("f1", "r1", 3, DEFAULT_CHECKPOINT_INTERVAL);
        for i in 0..5 {
            tracker.log(LogLevel::Info, format!("line {}", i));
        }
        let snapshot = tracker.snapshot(RunStatus::Running, None);
        let lines: Vec<_> = snapshot.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(lines, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_percent_and_message() {
        let mut tracker = ProgressTracker::new("f1", "r1", 10, DEFAULT_CHECKPOINT_INTERVAL);
        tracker.set_total(4);
        tracker.record(RecordOutcome::Created);
        tracker.record(RecordOutcome::Error);

        let snapshot = tracker.snapshot(RunStatus::Running, None);
        assert_eq!(snapshot.percent, Some(50.0));
        assert_eq!(snapshot.message, "Importing 2 / 4");
        assert_eq!(snapshot.counters.processed, 2);

        let done = tracker.snapshot(RunStatus::Completed, None);
        assert_eq!(done.eta_secs, None);
        assert_eq!(done.message, "Completed: 1 created, 0 updated, 0 skipped, 1 errors");
    }

    #[test]
    fn test_empty_feed_is_fully_done() {
        let mut tracker = ProgressTracker::new("f1", "r1", 10, DEFAULT_CHECKPOINT_INTERVAL);
        tracker.set_total(0);
        assert_eq!(tracker.snapshot(RunStatus::Completed, None).percent, Some(100.0));
    }

    #[test]
    fn test_checkpoint_due_after_interval() {
        let tracker = ProgressTracker::new("f1", "r1", 10, Duration::ZERO);
        assert!(tracker.checkpoint_due());
        let tracker = ProgressTracker::new("f1", "r1", 10, Duration::from_secs(3600));
        assert!(!tracker.checkpoint_due());
    }
}
