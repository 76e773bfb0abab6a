// ==========================================
// Product Feed Import - schema inspector
// ==========================================
// Field discovery over a bounded prefix of a feed, used by
// preview and as input to auto-mapping. Read-only.
// ==========================================

use crate::config::pipeline_config_trait::{DEFAULT_INSPECT_LIMIT, DEFAULT_SAMPLE_SIZE};
use crate::domain::record::RawRecord;
use crate::domain::types::FeedFormat;
use crate::importer::error::ImportResult;
use crate::importer::feed_parser::FeedSource;
use serde::Serialize;
use std::collections::HashSet;

/// Result of a feed preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPreview {
    /// Distinct source field names, in order of first appearance.
    pub fields: Vec<String>,
    pub sample_items: Vec<RawRecord>,
    pub total_count: u64,
    pub detected_format: FeedFormat,
    pub detected_item_path: Option<String>,
    /// Per-record errors seen within the inspected prefix.
    pub record_errors: usize,
}

pub struct SchemaInspector {
    inspect_limit: usize,
    sample_size: usize,
}

impl Default for SchemaInspector {
    fn default() -> Self {
        Self::new(DEFAULT_INSPECT_LIMIT, DEFAULT_SAMPLE_SIZE)
    }
}

impl SchemaInspector {
    pub fn new(inspect_limit: usize, sample_size: usize) -> Self {
        Self {
            inspect_limit: inspect_limit.max(1),
            sample_size: sample_size.min(inspect_limit.max(1)),
        }
    }

    /// Distinct field names across the first `inspect_limit` records.
    pub fn inspect_fields(&self, source: &FeedSource) -> ImportResult<Vec<String>> {
        let mut fields = FieldCollector::default();
        for item in source.records()?.take(self.inspect_limit) {
            if let Ok(record) = item? {
                fields.observe(&record);
            }
        }
        Ok(fields.into_fields())
    }

    pub fn preview(&self, source: &FeedSource) -> ImportResult<FeedPreview> {
        let mut fields = FieldCollector::default();
        let mut sample_items = Vec::with_capacity(self.sample_size);
        let mut record_errors = 0;

        for item in source.records()?.take(self.inspect_limit) {
            match item? {
                Ok(record) => {
                    fields.observe(&record);
                    if sample_items.len() < self.sample_size {
                        sample_items.push(record);
                    }
                }
                Err(_) => record_errors += 1,
            }
        }

        Ok(FeedPreview {
            fields: fields.into_fields(),
            sample_items,
            total_count: source.count()?,
            detected_format: source.format(),
            detected_item_path: source.item_path().map(str::to_string),
            record_errors,
        })
    }
}

#[derive(Default)]
struct FieldCollector {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl FieldCollector {
    fn observe(&mut self, record: &RawRecord) {
        for key in record.keys() {
            if self.seen.insert(key.clone()) {
                self.ordered.push(key.clone());
            }
        }
    }

    fn into_fields(self) -> Vec<String> {
        self.ordered
    }
}
