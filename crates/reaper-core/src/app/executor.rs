//! Bounded Executor - runs deletion tasks with a fixed concurrency ceiling.
//!
//! # ライフサイクル
//! 1. `start()`: `concurrency` 個のワーカーを spawn（キューは一本を共有）
//! 2. `submit()`: タスクを投入（キューが満杯なら待つ）
//! 3. `drain()`: キューを閉じて全ワーカーの終了を待つ
//!    = 投入済みタスクがすべて終端状態になる
//! 4. `shutdown()`: cancel してから drain
//!
//! # 方針
//! - 1 ワーカー = 同時に 1 delete。よって in-flight は常に `concurrency` 以下
//! - 空いたワーカーはすぐ次のタスクを取る
//! - タスクの失敗は記録するだけで、兄弟タスクには波及しない
//! - キャンセルは admission 時にだけ見る。実行中の delete は最後まで走らせ、
//!   キューに残ったものは CANCELLED として記録する

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::collector::OutcomeCollector;
use crate::domain::{
    Candidate, DeletionError, DeletionTask, Outcome, ReapEvent, ResourceRef, TaskState,
};
use crate::ports::{CloudApi, EventSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of deletions in flight. Clamped to at least 1.
    pub concurrency: usize,

    /// Per delete call. `None` waits forever.
    pub task_timeout: Option<Duration>,

    /// Record what would be deleted without calling delete.
    pub dry_run: bool,
}

impl ExecutorConfig {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            task_timeout: None,
            dry_run: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Sender half of the cancellation signal.
///
/// Clones share the same signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        // send_replace works even when no executor is subscribed yet.
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a worker needs, shared by all workers.
struct WorkerShared {
    api: Arc<dyn CloudApi>,
    collector: OutcomeCollector,
    sink: Arc<dyn EventSink>,
    config: ExecutorConfig,
}

/// A running pool of deletion workers.
/// - `queue_tx` を drop するとワーカーはキューを消化して止まる
/// - `cancel` は以降の admission を止めるだけで、実行中の delete は止めない
pub struct BoundedExecutor {
    queue_tx: mpsc::Sender<DeletionTask>,
    cancel: CancelHandle,
    joins: Vec<JoinHandle<()>>,
}

impl BoundedExecutor {
    /// Spawns the worker pool. Must be called inside a tokio runtime.
    pub fn start(
        config: ExecutorConfig,
        api: Arc<dyn CloudApi>,
        collector: OutcomeCollector,
        sink: Arc<dyn EventSink>,
        cancel: CancelHandle,
    ) -> Self {
        let workers = config.concurrency.max(1);
        let (queue_tx, queue_rx) = mpsc::channel(workers * 2);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let shared = Arc::new(WorkerShared {
            api,
            collector,
            sink,
            config,
        });

        let mut joins = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let rx = Arc::clone(&queue_rx);
            let shared = Arc::clone(&shared);
            let cancel_rx = cancel.subscribe();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, rx, shared, cancel_rx).await;
            }));
        }
        debug!(workers, "executor started");

        Self {
            queue_tx,
            cancel,
            joins,
        }
    }

    /// Queues a task. Gives the task back if every worker is gone.
    pub async fn submit(&self, task: DeletionTask) -> Result<(), DeletionTask> {
        self.queue_tx.send(task).await.map_err(|e| e.0)
    }

    /// Stop admitting tasks. Queued tasks are recorded as cancelled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Closes the queue and waits until every submitted task is terminal.
    pub async fn drain(self) {
        drop(self.queue_tx);
        for join in self.joins {
            if let Err(e) = join.await {
                warn!(error = %e, "executor worker ended abnormally");
            }
        }
        debug!("executor drained");
    }

    /// Cancel, then drain.
    pub async fn shutdown(self) {
        self.cancel();
        self.drain().await;
    }
}

async fn worker_loop(
    worker_id: usize,
    queue_rx: Arc<Mutex<mpsc::Receiver<DeletionTask>>>,
    shared: Arc<WorkerShared>,
    cancel_rx: watch::Receiver<bool>,
) {
    loop {
        // ロック下で行うのは recv だけ。delete はロックの外で走る
        let next = {
            let mut rx = queue_rx.lock().await;
            rx.recv().await
        };
        let Some(mut task) = next else {
            break;
        };

        if *cancel_rx.borrow() {
            cancel_task(&shared, &mut task);
            continue;
        }

        if let Err(e) = task.start() {
            warn!(worker = worker_id, task = %task.id(), error = %e, "task not pending, dropping");
            continue;
        }
        debug!(worker = worker_id, task = %task.id(), resource = %task.candidate().id(), "admitted");

        let succeeded = run_task(&shared, &task).await;
        let transition = if succeeded { task.succeed() } else { task.fail() };
        if let Err(e) = transition {
            warn!(worker = worker_id, task = %task.id(), error = %e, "unexpected task state");
        }
        debug_assert!(task.state().is_terminal());
    }
    debug!(worker = worker_id, "worker stopped");
}

fn cancel_task(shared: &WorkerShared, task: &mut DeletionTask) {
    if let Err(e) = task.cancel() {
        warn!(task = %task.id(), error = %e, "cannot cancel task");
    }
    for candidate in task.dependents().iter().chain(std::iter::once(task.candidate())) {
        shared.collector.record(candidate.id(), Outcome::cancelled());
        shared.sink.emit(&ReapEvent::Cancelled {
            id: candidate.id().clone(),
        });
    }
    debug_assert_eq!(task.state(), TaskState::Cancelled);
}

/// Deletes the task's dependents, then its candidate. Returns whether the
/// candidate itself ended up deleted (or would be, in a dry run).
async fn run_task(shared: &WorkerShared, task: &DeletionTask) -> bool {
    if shared.config.dry_run {
        for candidate in task.dependents().iter().chain(std::iter::once(task.candidate())) {
            info!(resource = %candidate.id(), "dry run: would delete");
            shared.collector.record(candidate.id(), Outcome::would_delete());
            shared.sink.emit(&ReapEvent::WouldDelete {
                id: candidate.id().clone(),
            });
        }
        return true;
    }

    // dependents は全部試す。一つでも失敗したら親は消さない
    let mut first_failure: Option<(ResourceRef, String)> = None;
    for dependent in task.dependents() {
        if let Err(e) = delete_one(shared, dependent).await
            && first_failure.is_none()
        {
            first_failure = Some((dependent.id().clone(), e.to_string()));
        }
    }

    if let Some((dependent, reason)) = first_failure {
        let err = DeletionError::DependentFailed { dependent, reason };
        let id = task.candidate().id();
        warn!(resource = %id, error = %err, "not deleting");
        shared.collector.record(id, Outcome::failed(err.to_string()));
        shared.sink.emit(&ReapEvent::DeleteFailed {
            id: id.clone(),
            reason: err.to_string(),
        });
        return false;
    }

    delete_one(shared, task.candidate()).await.is_ok()
}

async fn delete_one(shared: &WorkerShared, candidate: &Candidate) -> Result<(), DeletionError> {
    let id = candidate.id();
    shared.sink.emit(&ReapEvent::Deleting { id: id.clone() });
    info!(resource = %id, "deleting");

    let result = match shared.config.task_timeout {
        Some(limit) => match tokio::time::timeout(limit, shared.api.delete(id)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(DeletionError::Timeout(limit)),
        },
        None => shared.api.delete(id).await,
    };

    match &result {
        Ok(()) => {
            info!(resource = %id, "deleted");
            shared.collector.record(id, Outcome::deleted());
            shared.sink.emit(&ReapEvent::Deleted { id: id.clone() });
        }
        Err(e) => {
            warn!(resource = %id, error = %e, "delete failed");
            shared.collector.record(id, Outcome::failed(e.to_string()));
            shared.sink.emit(&ReapEvent::DeleteFailed {
                id: id.clone(),
                reason: e.to_string(),
            });
        }
    }
    result
}
