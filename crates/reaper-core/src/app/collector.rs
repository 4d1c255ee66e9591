//! Outcome Collector.
//!
//! Executor ワーカー間で共有する唯一の可変状態。
//! `record` は一つのロック下での insert 一回なので、完了順序は問わない。

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::domain::{BatchId, BatchResult, Outcome, ResourceRef};

/// Cheap-clone handle over the batch's results.
#[derive(Debug, Clone)]
pub struct OutcomeCollector {
    inner: Arc<Mutex<BatchResult>>,
}

impl OutcomeCollector {
    pub fn new(batch_id: BatchId, dry_run: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BatchResult::new(batch_id, dry_run))),
        }
    }

    // insert は map 操作一回なので、poison されても中身は壊れていない
    fn lock(&self) -> MutexGuard<'_, BatchResult> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the terminal outcome of `id`.
    ///
    /// Returns `false` if `id` already had an outcome; the first one is kept.
    pub fn record(&self, id: &ResourceRef, outcome: Outcome) -> bool {
        let inserted = self.lock().insert(id.clone(), outcome);
        if !inserted {
            warn!(resource = %id, "outcome already recorded, keeping the first");
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn outcome(&self, id: &ResourceRef) -> Option<Outcome> {
        self.lock().get(id).cloned()
    }

    /// Finalizes the batch result.
    pub fn finish(self) -> BatchResult {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|p| p.into_inner()),
            Err(shared) => shared.lock().unwrap_or_else(|p| p.into_inner()).clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, OutcomeKind, ResourceKind};
    use ulid::Ulid;

    fn disk(n: usize) -> ResourceRef {
        ResourceRef::new(ResourceKind::Disk, Location::Zone("z".into()), format!("d-{n}"))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_all_kept() {
        let collector = OutcomeCollector::new(BatchId::from_ulid(Ulid::new()), false);

        let mut joins = Vec::new();
        for n in 0..64 {
            let c = collector.clone();
            joins.push(tokio::spawn(async move {
                c.record(&disk(n), Outcome::deleted());
            }));
        }
        for j in joins {
            j.await.unwrap();
        }

        let result = collector.finish();
        assert_eq!(result.len(), 64);
        assert!(result.iter().all(|(_, o)| o.kind == OutcomeKind::Deleted));
    }

    #[test]
    fn duplicate_record_is_rejected() {
        let collector = OutcomeCollector::new(BatchId::from_ulid(Ulid::new()), false);
        assert!(collector.record(&disk(1), Outcome::failed("boom")));
        assert!(!collector.record(&disk(1), Outcome::deleted()));
        assert_eq!(collector.outcome(&disk(1)), Some(Outcome::failed("boom")));
    }

    #[test]
    fn finish_works_while_other_handles_are_alive() {
        let collector = OutcomeCollector::new(BatchId::from_ulid(Ulid::new()), false);
        let other = collector.clone();
        other.record(&disk(1), Outcome::deleted());

        let result = collector.finish();
        assert_eq!(result.len(), 1);
    }
}
