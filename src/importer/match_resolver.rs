// ==========================================
// Product Feed Import - match resolver (Matching & Upsert Engine)
// ==========================================
// resolve(record, match_by, mode) -> Create | Update(id) | Skip(reason)
// upsert = lock key -> resolve -> write -> unlock
//
// The lock is keyed by `match_key:normalized_value` and shared by
// every running feed, so two feeds that both see "no match" for the
// same EAN cannot both create a product.
// ==========================================

use crate::domain::import_run::RecordOutcome;
use crate::domain::record::NormalizedRecord;
use crate::domain::target_schema::TargetField;
use crate::domain::types::{ImportMode, MatchKey};
use crate::importer::error::ImportResult;
use crate::importer::importer_trait::CatalogStore;
use crate::repository::error::RepositoryError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

// ==========================================
// Action
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchAction {
    Create,
    Update(String),
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// create_only and the product already exists
    AlreadyExists { product_id: String },
    /// update_only and nothing matched
    NoMatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyExists { product_id } => {
                write!(f, "product {} already exists (create_only)", product_id)
            }
            SkipReason::NoMatch => write!(f, "no matching product (update_only)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub action: MatchAction,
    /// How many catalog products carried the key value.
    pub matched: usize,
}

// ==========================================
// UpsertOutcome - what happened to one record
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created(String),
    Updated(String),
    Skipped(SkipReason),
    /// The record cannot be applied (no key value, required field missing).
    Invalid(String),
}

impl UpsertOutcome {
    pub fn record_outcome(&self) -> RecordOutcome {
        match self {
            UpsertOutcome::Created(_) => RecordOutcome::Created,
            UpsertOutcome::Updated(_) => RecordOutcome::Updated,
            UpsertOutcome::Skipped(_) => RecordOutcome::Skipped,
            UpsertOutcome::Invalid(_) => RecordOutcome::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
    pub outcome: UpsertOutcome,
    pub matched: usize,
}

/// Drops media targets for feeds that do not import images.
pub fn strip_images(record: &mut NormalizedRecord) {
    record.remove(TargetField::ImageUrl);
    record.remove(TargetField::GalleryImages);
}

/// Normalized key value of a record, None when the key field is blank.
pub fn match_value(record: &NormalizedRecord, match_by: MatchKey) -> Option<String> {
    record
        .get(match_by.target_field())
        .map(|v| match_by.normalize(&v.to_string()))
        .filter(|v| !v.is_empty())
}

// ==========================================
// KeyedLocks
// ==========================================
#[derive(Default)]
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> ImportResult<OwnedMutexGuard<()>> {
        let entry = {
            let mut entries = self.entries.lock().map_err(RepositoryError::lock)?;
            // drop keys nobody holds or waits on
            entries.retain(|_, m| Arc::strong_count(m) > 1);
            entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        Ok(entry.lock_owned().await)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

// ==========================================
// MatchResolver
// ==========================================
pub struct MatchResolver {
    catalog: Arc<dyn CatalogStore>,
    locks: KeyedLocks,
}

impl MatchResolver {
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            catalog,
            locks: KeyedLocks::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    /// Looks the record up and decides what the import mode allows.
    ///
    /// `value` is the record's normalized key value (see `match_value`).
    pub async fn resolve(
        &self,
        match_by: MatchKey,
        value: &str,
        mode: ImportMode,
    ) -> ImportResult<Resolution> {
        let found = self.catalog.find_products_by_match_key(match_by, value).await?;
        let matched = found.len();
        if matched > 1 {
            warn!(
                match_by = %match_by,
                value = %value,
                matched,
                "several catalog products share a match key, using the most recently updated"
            );
        }

        let action = match found.into_iter().next() {
            Some(existing) if mode.allows_update() => MatchAction::Update(existing.id),
            Some(existing) => MatchAction::Skip(SkipReason::AlreadyExists {
                product_id: existing.id,
            }),
            None if mode.allows_create() => MatchAction::Create,
            None => MatchAction::Skip(SkipReason::NoMatch),
        };
        Ok(Resolution { action, matched })
    }

    /// Resolves and applies one record under the key lock.
    ///
    /// # Errors
    /// Catalog lookup/write failures. Invalid records are an
    /// `UpsertOutcome::Invalid`, not an error.
    pub async fn upsert(
        &self,
        record: &NormalizedRecord,
        match_by: MatchKey,
        mode: ImportMode,
        feed_id: &str,
    ) -> ImportResult<Upsert> {
        let Some(value) = match_value(record, match_by) else {
            return Ok(Upsert {
                outcome: UpsertOutcome::Invalid(format!("no value for match key '{}'", match_by)),
                matched: 0,
            });
        };

        let _guard = self.locks.lock(&format!("{}:{}", match_by, value)).await?;
        let resolution = self.resolve(match_by, &value, mode).await?;

        let outcome = match resolution.action {
            MatchAction::Create => {
                let missing = record.missing_required();
                if missing.is_empty() {
                    let id = self.catalog.create_product(record, feed_id).await?;
                    debug!(product_id = %id, key = %value, "product created");
                    UpsertOutcome::Created(id)
                } else {
                    let names: Vec<&str> = missing.iter().map(TargetField::as_str).collect();
                    UpsertOutcome::Invalid(format!(
                        "cannot create product, missing required fields: {}",
                        names.join(", ")
                    ))
                }
            }
            MatchAction::Update(id) => {
                self.catalog.update_product(&id, record).await?;
                debug!(product_id = %id, key = %value, "product updated");
                UpsertOutcome::Updated(id)
            }
            MatchAction::Skip(reason) => UpsertOutcome::Skipped(reason),
        };

        Ok(Upsert {
            outcome,
            matched: resolution.matched,
        })
    }
}
