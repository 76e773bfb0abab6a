// ==========================================
// Product Feed Import - progress store
// ==========================================
// feed_id -> latest ImportProgress snapshot.
// Snapshots are immutable Arcs swapped in whole, so a reader
// never observes a half-written counter set.
// In memory only: a restart starts every feed from idle.
// ==========================================

use crate::domain::import_run::ImportProgress;
use crate::repository::error::{RepositoryError, RepositoryResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct ProgressStore {
    snapshots: RwLock<HashMap<String, Arc<ImportProgress>>>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot for a feed, if any run has reported since start-up.
    pub fn get(&self, feed_id: &str) -> RepositoryResult<Option<Arc<ImportProgress>>> {
        let snapshots = self.snapshots.read().map_err(RepositoryError::lock)?;
        Ok(snapshots.get(feed_id).cloned())
    }

    /// Replaces the feed's snapshot.
    pub fn replace(&self, progress: ImportProgress) -> RepositoryResult<()> {
        let mut snapshots = self.snapshots.write().map_err(RepositoryError::lock)?;
        snapshots.insert(progress.feed_id.clone(), Arc::new(progress));
        Ok(())
    }

    /// Drops the feed's snapshot (the feed reads as idle afterwards).
    pub fn clear(&self, feed_id: &str) -> RepositoryResult<()> {
        let mut snapshots = self.snapshots.write().map_err(RepositoryError::lock)?;
        snapshots.remove(feed_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RunStatus;

    #[test]
    fn test_replace_not_mutate() {
        let store = ProgressStore::new();
        let mut progress = ImportProgress::idle("f1");
        progress.status = RunStatus::Running;
        progress.counters.processed = 10;
        store.replace(progress.clone()).unwrap();

        let before = store.get("f1").unwrap().unwrap();

        progress.counters.processed = 20;
        store.replace(progress).unwrap();

        // a reader holding the old snapshot still sees consistent values
        assert_eq!(before.counters.processed, 10);
        assert_eq!(store.get("f1").unwrap().unwrap().counters.processed, 20);

        store.clear("f1").unwrap();
        assert!(store.get("f1").unwrap().is_none());
    }
}
