//! Disks with no attached users are abandoned.

use async_trait::async_trait;

use super::{EvalDeps, PolicyContext, ReapPolicy, Verdict};
use crate::domain::{Candidate, EvaluationError, ResourceKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskPolicy;

#[async_trait]
impl ReapPolicy for DiskPolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Disk
    }

    async fn evaluate(
        &self,
        candidate: &Candidate,
        _ctx: &PolicyContext,
        _deps: &EvalDeps<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let users = &candidate.metadata().users;
        if users.is_empty() {
            Ok(Verdict::Eligible)
        } else {
            Ok(Verdict::Retain(format!("attached to {}", users.join(", "))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, Metadata, ResourceRef};
    use crate::impls::memory::InMemoryCloud;
    use crate::policies::testing;

    #[tokio::test]
    async fn attached_disks_are_retained() {
        let cloud = InMemoryCloud::new();
        let clock = testing::clock();
        let deps = testing::deps(&cloud, None, &clock);
        let ctx = PolicyContext::default();

        let free = Candidate::bare(ResourceKind::Disk, Location::Zone("z".into()), "a");
        let used = Candidate::new(
            ResourceRef::new(ResourceKind::Disk, Location::Zone("z".into()), "b"),
            Metadata {
                users: vec!["instance-1".to_string()],
                ..Metadata::default()
            },
        );

        assert_eq!(
            DiskPolicy.evaluate(&free, &ctx, &deps).await.unwrap(),
            Verdict::Eligible
        );
        assert_eq!(
            DiskPolicy.evaluate(&used, &ctx, &deps).await.unwrap(),
            Verdict::Retain("attached to instance-1".to_string())
        );
    }
}
