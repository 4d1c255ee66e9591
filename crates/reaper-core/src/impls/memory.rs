//! In-memory fakes for tests and local runs.
//!
//! `InMemoryCloud`:
//! - リソースは挿入順に保持し、delete 呼び出しをすべて記録する
//! - リソース単位で失敗・遅延・ハングを注入できる
//! - in-flight の delete 数（現在値とピーク）をゲージで追う

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    Candidate, CommandError, DeletionError, EvaluationError, Metadata, QueryError, ResourceKind,
    ResourceRef,
};
use crate::ports::{CloudApi, ListFilter, LivenessProbe};

#[derive(Debug, Default)]
pub struct InMemoryCloud {
    resources: Mutex<Vec<Candidate>>,
    delete_calls: Mutex<Vec<ResourceRef>>,
    failing_deletes: HashMap<ResourceRef, String>,
    hanging_deletes: HashSet<ResourceRef>,
    failing_describes: HashSet<ResourceRef>,
    failing_lists: HashSet<ResourceKind>,
    delete_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(command: String) -> CommandError {
    CommandError::Failed {
        command,
        status: "exit status: 1".to_string(),
        stderr: "injected failure".to_string(),
    }
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, candidate: Candidate) -> Self {
        lock(&self.resources).push(candidate);
        self
    }

    /// Deletes of `id` fail with `reason` (the resource stays).
    pub fn fail_delete(mut self, id: &ResourceRef, reason: impl Into<String>) -> Self {
        self.failing_deletes.insert(id.clone(), reason.into());
        self
    }

    /// Deletes of `id` never complete.
    pub fn hang_delete(mut self, id: &ResourceRef) -> Self {
        self.hanging_deletes.insert(id.clone());
        self
    }

    pub fn fail_describe(mut self, id: &ResourceRef) -> Self {
        self.failing_describes.insert(id.clone());
        self
    }

    pub fn fail_list(mut self, kind: ResourceKind) -> Self {
        self.failing_lists.insert(kind);
        self
    }

    /// Every delete call takes `delay` before it resolves.
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Delete calls in the order they were issued, failed ones included.
    pub fn delete_calls(&self) -> Vec<ResourceRef> {
        lock(&self.delete_calls).clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn contains(&self, id: &ResourceRef) -> bool {
        lock(&self.resources).iter().any(|c| c.id() == id)
    }

    /// Resources of `kind` still present.
    pub fn remaining(&self, kind: ResourceKind) -> Vec<ResourceRef> {
        lock(&self.resources)
            .iter()
            .filter(|c| c.kind() == kind)
            .map(|c| c.id().clone())
            .collect()
    }
}

/// Decrements the in-flight gauge when a delete resolves or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(current: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self(current)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CloudApi for InMemoryCloud {
    /// Filter expressions are not interpreted; a scope keeps only names of
    /// the form `<scope>@...` (image digests of one repository).
    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<Candidate>, QueryError> {
        if self.failing_lists.contains(&kind) {
            return Err(QueryError::List {
                kind,
                source: injected(format!("list {kind}")),
            });
        }
        let in_scope = |c: &Candidate| match &filter.scope {
            Some(scope) => c
                .name()
                .strip_prefix(scope.as_str())
                .is_some_and(|rest| rest.starts_with('@')),
            None => true,
        };
        Ok(lock(&self.resources)
            .iter()
            .filter(|c| c.kind() == kind && in_scope(*c))
            .cloned()
            .collect())
    }

    async fn describe(&self, id: &ResourceRef) -> Result<Metadata, QueryError> {
        if self.failing_describes.contains(id) {
            return Err(QueryError::Describe {
                id: id.clone(),
                source: injected(format!("describe {id}")),
            });
        }
        lock(&self.resources)
            .iter()
            .find(|c| c.id() == id)
            .map(|c| c.metadata().clone())
            .ok_or_else(|| QueryError::Describe {
                id: id.clone(),
                source: CommandError::Failed {
                    command: format!("describe {id}"),
                    status: "exit status: 1".to_string(),
                    stderr: "not found".to_string(),
                },
            })
    }

    async fn delete(&self, id: &ResourceRef) -> Result<(), DeletionError> {
        lock(&self.delete_calls).push(id.clone());
        let _guard = InFlight::enter(&self.in_flight, &self.peak_in_flight);

        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
        if self.hanging_deletes.contains(id) {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = self.failing_deletes.get(id) {
            return Err(DeletionError::Rejected(reason.clone()));
        }

        let mut resources = lock(&self.resources);
        match resources.iter().position(|c| c.id() == id) {
            Some(index) => {
                resources.remove(index);
                Ok(())
            }
            None => Err(DeletionError::NotFound(id.clone())),
        }
    }
}

/// Liveness probe answering from a fixed table. Unknown URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    statuses: HashMap<String, u16>,
    unreachable: HashSet<String>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.statuses.insert(url.into(), status);
        self
    }

    /// Probing `url` fails at the transport level.
    pub fn unreachable(mut self, url: impl Into<String>) -> Self {
        self.unreachable.insert(url.into());
        self
    }
}

#[async_trait]
impl LivenessProbe for StaticProbe {
    async fn probe(&self, instance_url: &str) -> Result<u16, EvaluationError> {
        if self.unreachable.contains(instance_url) {
            return Err(EvaluationError::Probe {
                url: instance_url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.statuses.get(instance_url).copied().unwrap_or(404))
    }
}
