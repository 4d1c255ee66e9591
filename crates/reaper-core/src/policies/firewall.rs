//! Firewall rules whose target tags no instance carries any more.

use async_trait::async_trait;
use tracing::debug;

use super::{EvalDeps, PolicyContext, ReapPolicy, Verdict};
use crate::domain::{Candidate, EvaluationError, QueryError, ResourceKind};
use crate::ports::{CloudApi, ListFilter};

#[derive(Debug, Clone, Copy, Default)]
pub struct FirewallRulePolicy;

#[async_trait]
impl ReapPolicy for FirewallRulePolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::FirewallRule
    }

    async fn prepare(
        &self,
        api: &dyn CloudApi,
        _filter: &ListFilter,
    ) -> Result<PolicyContext, QueryError> {
        let instances = api
            .list(ResourceKind::Instance, &ListFilter::default())
            .await?;

        let mut ctx = PolicyContext::default();
        for instance in &instances {
            ctx.instance_tags
                .extend(instance.metadata().network_tags.iter().cloned());
        }
        debug!(
            instances = instances.len(),
            tags = ctx.instance_tags.len(),
            "collected instance tags"
        );
        Ok(ctx)
    }

    async fn evaluate(
        &self,
        candidate: &Candidate,
        ctx: &PolicyContext,
        _deps: &EvalDeps<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let target_tags = &candidate.metadata().target_tags;
        // A rule without target tags applies to every instance in the network.
        if target_tags.is_empty() {
            return Ok(Verdict::Retain("applies to all instances".to_string()));
        }
        match target_tags.iter().find(|t| ctx.instance_tags.contains(*t)) {
            Some(tag) => Ok(Verdict::Retain(format!("tag {tag} is still in use"))),
            None => Ok(Verdict::Eligible),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, Metadata, ResourceRef};
    use crate::impls::memory::InMemoryCloud;
    use crate::policies::testing;
    use rstest::rstest;

    fn with_tags(kind: ResourceKind, name: &str, tags: &[&str]) -> Candidate {
        let tags: Vec<String> = tags.iter().map(|s| s.to_string()).collect();
        let metadata = match kind {
            ResourceKind::Instance => Metadata {
                network_tags: tags,
                ..Metadata::default()
            },
            _ => Metadata {
                target_tags: tags,
                ..Metadata::default()
            },
        };
        Candidate::new(ResourceRef::global(kind, name), metadata)
    }

    #[rstest]
    #[case(&["web"], false)]
    #[case(&["gone"], true)]
    #[case(&["gone", "web"], false)]
    #[case(&[], false)]
    #[tokio::test]
    async fn rule_is_eligible_only_when_no_instance_carries_its_tags(
        #[case] tags: &[&str],
        #[case] eligible: bool,
    ) {
        let cloud = InMemoryCloud::new()
            .with(Candidate::new(
                ResourceRef::new(ResourceKind::Instance, Location::Zone("z".into()), "vm"),
                Metadata {
                    network_tags: vec!["web".to_string(), "ssh".to_string()],
                    ..Metadata::default()
                },
            ));
        let clock = testing::clock();
        let deps = testing::deps(&cloud, None, &clock);
        let ctx = FirewallRulePolicy
            .prepare(&cloud, &ListFilter::default())
            .await
            .unwrap();

        let rule = with_tags(ResourceKind::FirewallRule, "fw", tags);
        let verdict = FirewallRulePolicy.evaluate(&rule, &ctx, &deps).await.unwrap();
        assert_eq!(verdict == Verdict::Eligible, eligible);
    }

    #[tokio::test]
    async fn instance_listing_failure_aborts_prepare() {
        let cloud = InMemoryCloud::new()
            .with(with_tags(ResourceKind::FirewallRule, "fw", &["x"]))
            .fail_list(ResourceKind::Instance);
        assert!(matches!(
            FirewallRulePolicy
                .prepare(&cloud, &ListFilter::default())
                .await,
            Err(QueryError::List { .. })
        ));
    }
}
