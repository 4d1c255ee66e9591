//! Target pools whose member instances are all gone.
//!
//! # 判定
//! - メンバーのどれか一つでも probe に 200 を返せば生きている
//! - メンバーが空の pool は死んでいる
//! - 死んだ pool を指す forwarding rule を先に消す（dependents）

use async_trait::async_trait;
use tracing::debug;

use super::{EvalDeps, PolicyContext, ReapPolicy, Verdict};
use crate::domain::{Candidate, EvaluationError, QueryError, ResourceKind};
use crate::ports::{CloudApi, ListFilter};

#[derive(Debug, Clone, Copy, Default)]
pub struct TargetPoolPolicy;

#[async_trait]
impl ReapPolicy for TargetPoolPolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::TargetPool
    }

    async fn prepare(
        &self,
        api: &dyn CloudApi,
        _filter: &ListFilter,
    ) -> Result<PolicyContext, QueryError> {
        let rules = api
            .list(ResourceKind::ForwardingRule, &ListFilter::default())
            .await?;

        let mut ctx = PolicyContext::default();
        for rule in rules {
            let Some(target) = rule.metadata().target.clone() else {
                continue;
            };
            if target.kind != ResourceKind::TargetPool {
                continue;
            }
            ctx.forwarding_rules.entry(target).or_default().push(rule);
        }
        debug!(pools = ctx.forwarding_rules.len(), "mapped forwarding rules");
        Ok(ctx)
    }

    async fn evaluate(
        &self,
        candidate: &Candidate,
        _ctx: &PolicyContext,
        deps: &EvalDeps<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let Some(probe) = deps.probe else {
            return Err(EvaluationError::query(
                candidate.id(),
                "no liveness probe configured",
            ));
        };

        let described = deps
            .api
            .describe(candidate.id())
            .await
            .map_err(|e| EvaluationError::query(candidate.id(), e))?;

        for instance in &described.instances {
            let status = probe.probe(instance).await?;
            if status == 200 {
                return Ok(Verdict::Retain(format!("member {instance} is alive")));
            }
            debug!(pool = %candidate.id(), instance, status, "member is gone");
        }
        Ok(Verdict::Eligible)
    }

    fn dependents(&self, candidate: &Candidate, ctx: &PolicyContext) -> Vec<Candidate> {
        ctx.forwarding_rules
            .get(candidate.id())
            .cloned()
            .unwrap_or_default()
    }
}
