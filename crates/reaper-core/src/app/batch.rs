//! Batch runner.
//!
//! 1 バッチ = 1 リソース種別:
//! 1. policy の `prepare` で lookup を作り、`list` で候補を取る
//!    （ここでの `QueryError` は何も消す前にバッチを中断する）
//! 2. 候補を一件ずつ評価しつつ、eligible なものは executor が裏で削除する
//! 3. executor を drain して `BatchResult` を返す

use std::sync::Arc;

use tracing::{Instrument, info, info_span, warn};

use super::collector::OutcomeCollector;
use super::config::ReaperConfig;
use super::executor::{BoundedExecutor, CancelHandle, ExecutorConfig};
use super::registry::PolicyRegistry;
use crate::domain::{
    BatchId, BatchResult, DeletionTask, Outcome, ReapError, ReapEvent, ResourceKind,
};
use crate::policies::{EvalDeps, ReapPolicy, Verdict};
use crate::ports::{Clock, CloudApi, EventSink, IdGenerator, LivenessProbe};

/// Built by `ReaperBuilder`.
pub struct Reaper {
    pub(super) api: Arc<dyn CloudApi>,
    pub(super) probe: Option<Arc<dyn LivenessProbe>>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) sink: Arc<dyn EventSink>,
    pub(super) ids: Arc<dyn IdGenerator>,
    pub(super) config: ReaperConfig,
    pub(super) cancel: CancelHandle,
    pub(super) registry: PolicyRegistry,
}

impl Reaper {
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Runs one batch for `kind`.
    pub async fn run(&self, kind: ResourceKind) -> Result<BatchResult, ReapError> {
        let policy = self.registry.get(kind)?;
        let batch_id = self.ids.generate_batch_id();
        let span = info_span!("batch", batch = %batch_id, kind = %kind);
        self.run_batch(batch_id, policy).instrument(span).await
    }

    /// Runs batches back to back, merging their results.
    ///
    /// - 開始できなかった最初のバッチで止まり、その `ReapError` を返す
    /// - 完了済みバッチの結果はエラーと一緒に捨てる
    pub async fn run_many(&self, kinds: &[ResourceKind]) -> Result<BatchResult, ReapError> {
        let mut merged: Option<BatchResult> = None;
        for &kind in kinds {
            let result = self.run(kind).await?;
            match merged.as_mut() {
                Some(all) => all.absorb(result),
                None => merged = Some(result),
            }
        }
        Ok(merged.unwrap_or_else(|| {
            BatchResult::new(self.ids.generate_batch_id(), self.config.dry_run)
        }))
    }

    async fn run_batch(
        &self,
        batch_id: BatchId,
        policy: Arc<dyn ReapPolicy>,
    ) -> Result<BatchResult, ReapError> {
        let kind = policy.kind();
        let filter = self.config.filter_for(kind);
        let api = self.api.as_ref();

        let ctx = policy.prepare(api, &filter).await?;
        let listing = policy.list(api, &filter).await?;
        self.sink.emit(&ReapEvent::Listed {
            kind,
            count: listing.len(),
        });

        let dry_run = self.config.dry_run;
        let concurrency = self
            .config
            .concurrency_for(kind, policy.default_concurrency());
        let executor_config = ExecutorConfig::new(concurrency)
            .with_timeout(self.config.task_timeout())
            .dry_run(dry_run);
        info!(concurrency, dry_run, "starting batch");

        let collector = OutcomeCollector::new(batch_id, dry_run);
        let executor = BoundedExecutor::start(
            executor_config,
            Arc::clone(&self.api),
            collector.clone(),
            Arc::clone(&self.sink),
            self.cancel.clone(),
        );

        let deps = EvalDeps {
            api,
            probe: self.probe.as_deref(),
            clock: self.clock.as_ref(),
        };
        for candidate in listing {
            let id = candidate.id().clone();
            match policy.evaluate(&candidate, &ctx, &deps).await {
                Ok(Verdict::Eligible) => {
                    let dependents = policy.dependents(&candidate, &ctx);
                    let task = dependents.into_iter().fold(
                        DeletionTask::new(self.ids.generate_task_id(), candidate),
                        DeletionTask::with_dependent,
                    );
                    if let Err(task) = executor.submit(task).await {
                        warn!(resource = %id, "executor stopped, task not submitted");
                        collector.record(task.candidate().id(), Outcome::failed("executor stopped"));
                    }
                }
                Ok(Verdict::Retain(reason)) => {
                    collector.record(&id, Outcome::retained(reason.clone()));
                    self.sink.emit(&ReapEvent::Retained { id, reason });
                }
                Err(e) => {
                    warn!(resource = %id, error = %e, "cannot evaluate, skipping");
                    collector.record(&id, Outcome::skipped(e.to_string()));
                    self.sink.emit(&ReapEvent::Skipped {
                        id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if self.cancel.is_cancelled() {
            info!("cancelled, shutting down executor");
            executor.shutdown().await;
        } else {
            executor.drain().await;
        }
        let result = collector.finish();
        let summary = result.summary();
        info!(
            deleted = summary.succeeded,
            failed = summary.failed,
            retained = summary.retained,
            skipped = summary.skipped,
            "batch finished"
        );
        Ok(result)
    }
}
