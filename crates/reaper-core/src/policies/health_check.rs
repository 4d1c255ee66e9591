//! HTTP health checks no target pool references any more.

use async_trait::async_trait;

use super::{EvalDeps, PolicyContext, ReapPolicy, Verdict};
use crate::domain::{Candidate, EvaluationError, QueryError, ResourceKind, ResourceRef};
use crate::ports::{CloudApi, ListFilter};

#[derive(Debug, Clone, Copy, Default)]
pub struct HealthCheckPolicy;

#[async_trait]
impl ReapPolicy for HealthCheckPolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::HttpHealthCheck
    }

    async fn prepare(
        &self,
        api: &dyn CloudApi,
        _filter: &ListFilter,
    ) -> Result<PolicyContext, QueryError> {
        let pools = api
            .list(ResourceKind::TargetPool, &ListFilter::default())
            .await?;

        let mut ctx = PolicyContext::default();
        for pool in pools {
            for check in &pool.metadata().health_checks {
                // Pools reference checks by self-link; checks are listed by name.
                let name = ResourceRef::from_link(ResourceKind::HttpHealthCheck, check)
                    .map(|r| r.name)
                    .unwrap_or_else(|| check.clone());
                ctx.referenced_health_checks.insert(name);
            }
        }
        Ok(ctx)
    }

    async fn evaluate(
        &self,
        candidate: &Candidate,
        ctx: &PolicyContext,
        _deps: &EvalDeps<'_>,
    ) -> Result<Verdict, EvaluationError> {
        if ctx.referenced_health_checks.contains(candidate.name()) {
            Ok(Verdict::Retain("referenced by a target pool".to_string()))
        } else {
            Ok(Verdict::Eligible)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, Metadata};
    use crate::impls::memory::InMemoryCloud;
    use crate::policies::testing;

    #[tokio::test]
    async fn only_unreferenced_checks_are_eligible() {
        let pool = Candidate::new(
            ResourceRef::new(ResourceKind::TargetPool, Location::Region("r".into()), "tp"),
            Metadata {
                health_checks: vec![
                    "https://www.googleapis.com/compute/v1/projects/p/global/httpHealthChecks/used"
                        .to_string(),
                ],
                ..Metadata::default()
            },
        );
        let used = Candidate::bare(ResourceKind::HttpHealthCheck, Location::Global, "used");
        let orphan = Candidate::bare(ResourceKind::HttpHealthCheck, Location::Global, "orphan");
        let cloud = InMemoryCloud::new()
            .with(pool)
            .with(used.clone())
            .with(orphan.clone());
        let clock = testing::clock();
        let deps = testing::deps(&cloud, None, &clock);

        let ctx = HealthCheckPolicy
            .prepare(&cloud, &ListFilter::default())
            .await
            .unwrap();

        assert!(matches!(
            HealthCheckPolicy.evaluate(&used, &ctx, &deps).await.unwrap(),
            Verdict::Retain(_)
        ));
        assert_eq!(
            HealthCheckPolicy.evaluate(&orphan, &ctx, &deps).await.unwrap(),
            Verdict::Eligible
        );
    }
}
