//! Reap policies - what to list, and when a listed resource is abandoned.
//!
//! リソース種別ごとに policy が一つ。policy は:
//! - `prepare`: バッチ単位の lookup (`PolicyContext`) を読み取り専用クエリで作る。
//!   失敗は `QueryError` でバッチ中断
//! - `list`: 候補を列挙する
//! - `evaluate`: 候補を一件判定する。副作用なし。二次クエリの失敗は
//!   `EvaluationError`（候補は消さない）
//! - `dependents`: eligible な候補より先に消すべきリソースを返す

mod cluster;
mod disk;
mod firewall;
mod health_check;
mod image;
mod target_pool;

pub use cluster::ClusterPolicy;
pub use disk::DiskPolicy;
pub use firewall::FirewallRulePolicy;
pub use health_check::HealthCheckPolicy;
pub use image::ImagePolicy;
pub use target_pool::TargetPoolPolicy;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::app::lister::Listing;
use crate::domain::{
    Candidate, ConfigError, EvaluationError, QueryError, ResourceKind, ResourceRef,
};
use crate::ports::{Clock, CloudApi, ListFilter, LivenessProbe};

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Age limit from a config value in hours.
///
/// Rejects limits longer than the whole representable calendar; no creation
/// time could ever be that old.
fn hours(value: u64, field: &str) -> Result<Duration, ConfigError> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_hours)
        .filter(|limit| DateTime::<Utc>::MIN_UTC.checked_add_signed(*limit).is_some())
        .ok_or_else(|| ConfigError::Invalid(format!("{field} is out of range")))
}

/// Result of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    /// Still in use; the reason is shown to the operator.
    Retain(String),
}

/// Short-lived lookup tables for one batch.
///
/// Built by `ReapPolicy::prepare`, dropped with the batch.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    /// Target pool -> forwarding rules pointing at it.
    pub forwarding_rules: HashMap<ResourceRef, Vec<Candidate>>,

    /// Names of health checks some target pool still references.
    pub referenced_health_checks: HashSet<String>,

    /// Network tags carried by existing instances.
    pub instance_tags: HashSet<String>,
}

/// Read-only collaborators a predicate may query.
pub struct EvalDeps<'a> {
    pub api: &'a dyn CloudApi,
    pub probe: Option<&'a dyn LivenessProbe>,
    pub clock: &'a dyn Clock,
}

#[async_trait]
pub trait ReapPolicy: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Concurrency used when neither the CLI nor the config file set one.
    fn default_concurrency(&self) -> usize {
        DEFAULT_CONCURRENCY
    }

    async fn prepare(
        &self,
        _api: &dyn CloudApi,
        _filter: &ListFilter,
    ) -> Result<PolicyContext, QueryError> {
        Ok(PolicyContext::default())
    }

    async fn list(&self, api: &dyn CloudApi, filter: &ListFilter) -> Result<Listing, QueryError> {
        Listing::fetch(api, self.kind(), filter).await
    }

    async fn evaluate(
        &self,
        candidate: &Candidate,
        ctx: &PolicyContext,
        deps: &EvalDeps<'_>,
    ) -> Result<Verdict, EvaluationError>;

    /// Resources to delete, in order, before `candidate`.
    fn dependents(&self, _candidate: &Candidate, _ctx: &PolicyContext) -> Vec<Candidate> {
        Vec::new()
    }
}
