//! Outcome model: per-candidate results and the batch report.
//!
//! # 不変条件
//! - 一覧に出た Candidate は `BatchResult` にちょうど一つの `Outcome` を持つ
//!   （削除・保持・スキップ・失敗・キャンセルのいずれか）
//! - 先に記録された Outcome が勝つ（二重記録は `insert` が false を返す）
//! - キャンセルは失敗とは別に集計する。一度も削除を試みていないため

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::BatchId;
use super::resource::ResourceRef;

/// Classification of what happened to one candidate.
///
/// Serialized as SCREAMING_SNAKE_CASE: DELETED / FAILED / RETAINED / ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    /// Passed the predicate and the delete call succeeded.
    Deleted,

    /// Passed the predicate but the delete call (or a dependent's) failed.
    Failed,

    /// The predicate said the resource is still in use.
    Retained,

    /// The predicate could not be evaluated; left alone.
    Skipped,

    /// Passed the predicate during a dry run.
    WouldDelete,

    /// Passed the predicate but was never admitted after cancellation.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn deleted() -> Self {
        Self {
            kind: OutcomeKind::Deleted,
            reason: None,
        }
    }

    pub fn would_delete() -> Self {
        Self {
            kind: OutcomeKind::WouldDelete,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::with_reason(OutcomeKind::Failed, reason)
    }

    pub fn retained(reason: impl Into<String>) -> Self {
        Self::with_reason(OutcomeKind::Retained, reason)
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::with_reason(OutcomeKind::Skipped, reason)
    }

    pub fn cancelled() -> Self {
        Self::with_reason(OutcomeKind::Cancelled, "batch cancelled before admission")
    }

    fn with_reason(kind: OutcomeKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: Some(reason.into()),
        }
    }
}

/// Candidate identity -> outcome, for one batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    batch_id: BatchId,
    dry_run: bool,
    outcomes: BTreeMap<ResourceRef, Outcome>,
}

impl BatchResult {
    pub fn new(batch_id: BatchId, dry_run: bool) -> Self {
        Self {
            batch_id,
            dry_run,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Records the outcome for `id`. Returns `false` (and keeps the first
    /// outcome) when `id` already has one.
    pub fn insert(&mut self, id: ResourceRef, outcome: Outcome) -> bool {
        match self.outcomes.entry(id) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
        }
    }

    pub fn get(&self, id: &ResourceRef) -> Option<&Outcome> {
        self.outcomes.get(id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceRef, &Outcome)> {
        self.outcomes.iter()
    }

    /// Merges another batch's outcomes (used when several kinds run back to back).
    pub fn absorb(&mut self, other: BatchResult) {
        for (id, outcome) in other.outcomes {
            self.insert(id, outcome);
        }
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            batch_id: Some(self.batch_id),
            dry_run: self.dry_run,
            ..BatchSummary::default()
        };
        for (id, outcome) in &self.outcomes {
            let reason = || outcome.reason.clone().unwrap_or_default();
            match outcome.kind {
                OutcomeKind::Deleted => summary.succeeded += 1,
                OutcomeKind::WouldDelete => summary.would_delete += 1,
                OutcomeKind::Retained => summary.retained += 1,
                OutcomeKind::Skipped => {
                    summary.skipped += 1;
                    summary.skips.push(Failure {
                        id: id.clone(),
                        reason: reason(),
                    });
                }
                OutcomeKind::Failed => {
                    summary.failed += 1;
                    summary.failures.push(Failure {
                        id: id.clone(),
                        reason: reason(),
                    });
                }
                OutcomeKind::Cancelled => {
                    summary.cancelled += 1;
                    summary.cancellations.push(Failure {
                        id: id.clone(),
                        reason: reason(),
                    });
                }
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub id: ResourceRef,
    pub reason: String,
}

/// Final tally reported to the operator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(serialize_with = "serialize_batch_id")]
    batch_id: Option<BatchId>,
    pub dry_run: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub retained: usize,
    pub skipped: usize,
    pub would_delete: usize,
    pub failures: Vec<Failure>,
    pub skips: Vec<Failure>,
    /// Never attempted; not failures.
    pub cancellations: Vec<Failure>,
}

fn serialize_batch_id<S: serde::Serializer>(
    id: &Option<BatchId>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match id {
        Some(id) => serializer.serialize_str(&id.to_string()),
        None => serializer.serialize_none(),
    }
}

impl BatchSummary {
    /// True when nothing failed or was cancelled. A dry run is always a success.
    pub fn is_success(&self) -> bool {
        self.dry_run || (self.failed == 0 && self.cancelled == 0)
    }

    pub fn batch_id(&self) -> Option<BatchId> {
        self.batch_id
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(batch_id) = self.batch_id {
            writeln!(f, "summary ({batch_id}):")?;
        } else {
            writeln!(f, "summary:")?;
        }
        if self.dry_run {
            writeln!(f, "  would delete: {}", self.would_delete)?;
        } else {
            writeln!(f, "  deleted:      {}", self.succeeded)?;
            writeln!(f, "  failed:       {}", self.failed)?;
            if self.cancelled > 0 {
                writeln!(f, "  cancelled:    {}", self.cancelled)?;
            }
        }
        writeln!(f, "  retained:     {}", self.retained)?;
        write!(f, "  skipped:      {}", self.skipped)?;
        for skip in &self.skips {
            write!(f, "\n  skipped {}: {}", skip.id, skip.reason)?;
        }
        for cancelled in &self.cancellations {
            write!(f, "\n  cancelled {}", cancelled.id)?;
        }
        for failure in &self.failures {
            write!(f, "\n  FAILED {}: {}", failure.id, failure.reason)?;
        }
        Ok(())
    }
}
