//! Leftover test clusters: name carries the prefix and age is past the limit.

use async_trait::async_trait;
use chrono::Duration;

use super::{EvalDeps, PolicyContext, ReapPolicy, Verdict, hours};
use crate::app::config::ClusterConfig;
use crate::domain::{Candidate, ConfigError, EvaluationError, ResourceKind};

/// Cluster deletes take minutes each.
pub const DEFAULT_CLUSTER_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct ClusterPolicy {
    name_prefix: String,
    max_age: Duration,
}

impl ClusterPolicy {
    pub fn new(name_prefix: impl Into<String>, max_age: Duration) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            max_age,
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Result<Self, ConfigError> {
        let max_age = hours(config.max_age_hours, "clusters.max_age_hours")?;
        Ok(Self::new(config.name_prefix.clone(), max_age))
    }
}

#[async_trait]
impl ReapPolicy for ClusterPolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cluster
    }

    fn default_concurrency(&self) -> usize {
        DEFAULT_CLUSTER_CONCURRENCY
    }

    async fn evaluate(
        &self,
        candidate: &Candidate,
        _ctx: &PolicyContext,
        deps: &EvalDeps<'_>,
    ) -> Result<Verdict, EvaluationError> {
        if !candidate.name().starts_with(&self.name_prefix) {
            return Ok(Verdict::Retain(format!(
                "name lacks prefix {}",
                self.name_prefix
            )));
        }
        let Some(created_at) = candidate.metadata().created_at else {
            return Ok(Verdict::Retain("no creation time".to_string()));
        };
        if deps.clock.now() - created_at < self.max_age {
            return Ok(Verdict::Retain(format!("created {created_at}, too recent")));
        }
        Ok(Verdict::Eligible)
    }
}
