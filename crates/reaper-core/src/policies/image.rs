//! Untagged container images older than a minimum age.

use async_trait::async_trait;
use chrono::Duration;

use super::{EvalDeps, PolicyContext, ReapPolicy, Verdict, hours};
use crate::app::config::ImageConfig;
use crate::app::lister::Listing;
use crate::domain::{Candidate, ConfigError, EvaluationError, QueryError, ResourceKind};
use crate::ports::{CloudApi, ListFilter};

pub const DEFAULT_IMAGE_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
pub struct ImagePolicy {
    repository: String,
    min_age: Duration,
}

impl ImagePolicy {
    pub fn new(repository: impl Into<String>, min_age: Duration) -> Self {
        Self {
            repository: repository.into(),
            min_age,
        }
    }

    pub fn from_config(config: &ImageConfig) -> Result<Self, ConfigError> {
        let repository = config
            .repository
            .clone()
            .ok_or_else(|| ConfigError::Invalid("an image repository is required".into()))?;
        let min_age = hours(config.min_age_hours, "images.min_age_hours")?;
        Ok(Self::new(repository, min_age))
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }
}

#[async_trait]
impl ReapPolicy for ImagePolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Image
    }

    fn default_concurrency(&self) -> usize {
        DEFAULT_IMAGE_CONCURRENCY
    }

    async fn list(&self, api: &dyn CloudApi, filter: &ListFilter) -> Result<Listing, QueryError> {
        let filter = ListFilter {
            expression: filter.expression.clone(),
            scope: Some(self.repository.clone()),
        };
        Listing::fetch(api, ResourceKind::Image, &filter).await
    }

    async fn evaluate(
        &self,
        candidate: &Candidate,
        _ctx: &PolicyContext,
        deps: &EvalDeps<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let metadata = candidate.metadata();
        if !metadata.tags.is_empty() {
            return Ok(Verdict::Retain(format!(
                "tagged {}",
                metadata.tags.join(", ")
            )));
        }
        let Some(created_at) = metadata.created_at else {
            return Ok(Verdict::Retain("no creation time".to_string()));
        };
        if deps.clock.now() - created_at < self.min_age {
            return Ok(Verdict::Retain(format!("created {created_at}, too recent")));
        }
        Ok(Verdict::Eligible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Metadata, ResourceRef};
    use crate::impls::memory::InMemoryCloud;
    use crate::policies::testing;
    use crate::ports::Clock;
    use chrono::{TimeZone, Utc};

    const REPO: &str = "gcr.io/p/app";

    fn image(digest: &str, tags: &[&str], hours_old: Option<i64>) -> Candidate {
        let clock = testing::clock();
        Candidate::new(
            ResourceRef::global(ResourceKind::Image, format!("{REPO}@{digest}")),
            Metadata {
                digest: Some(digest.to_string()),
                tags: tags.iter().map(|s| s.to_string()).collect(),
                created_at: hours_old.map(|h| clock.now() - Duration::hours(h)),
                ..Metadata::default()
            },
        )
    }

    #[tokio::test]
    async fn old_untagged_images_are_eligible() {
        let policy = ImagePolicy::new(REPO, Duration::hours(24));
        let cloud = InMemoryCloud::new();
        let clock = testing::clock();
        let deps = testing::deps(&cloud, None, &clock);
        let ctx = PolicyContext::default();

        let cases = [
            (image("sha256:1", &[], Some(48)), true),
            (image("sha256:2", &["latest"], Some(48)), false),
            (image("sha256:3", &[], Some(2)), false),
            (image("sha256:4", &[], None), false),
        ];
        for (candidate, eligible) in cases {
            let verdict = policy.evaluate(&candidate, &ctx, &deps).await.unwrap();
            assert_eq!(verdict == Verdict::Eligible, eligible, "{}", candidate.id());
        }
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_repository() {
        let policy = ImagePolicy::new(REPO, Duration::hours(24));
        let other = Candidate::new(
            ResourceRef::global(ResourceKind::Image, "gcr.io/p/other@sha256:9"),
            Metadata {
                created_at: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
                ..Metadata::default()
            },
        );
        let cloud = InMemoryCloud::new()
            .with(image("sha256:1", &[], Some(48)))
            .with(other);

        let listing = policy.list(&cloud, &ListFilter::default()).await.unwrap();
        let names: Vec<_> = listing.map(|c| c.name().to_string()).collect();
        assert_eq!(names, [format!("{REPO}@sha256:1")]);
        assert_eq!(policy.default_concurrency(), 16);
    }

    #[test]
    fn from_config_requires_a_repository() {
        assert!(ImagePolicy::from_config(&ImageConfig::default()).is_err());

        let policy = ImagePolicy::from_config(&ImageConfig {
            repository: Some(REPO.to_string()),
            min_age_hours: 48,
        })
        .unwrap();
        assert_eq!(policy.repository(), REPO);
        assert_eq!(policy.min_age, Duration::hours(48));

        assert!(
            ImagePolicy::from_config(&ImageConfig {
                repository: Some(REPO.to_string()),
                min_age_hours: u64::MAX,
            })
            .is_err()
        );
    }

    #[test]
    fn min_age_beyond_the_calendar_is_rejected() {
        let err = ImagePolicy::from_config(&ImageConfig {
            repository: Some(REPO.to_string()),
            min_age_hours: 1_000_000_000_000,
        })
        .unwrap_err();
        assert!(err.to_string().contains("images.min_age_hours"));
    }

    #[tokio::test]
    async fn largest_min_age_keeps_every_image() {
        let policy = ImagePolicy::new(REPO, Duration::MAX);
        let cloud = InMemoryCloud::new();
        let clock = testing::clock();
        let deps = testing::deps(&cloud, None, &clock);
        let ancient = Candidate::new(
            ResourceRef::global(ResourceKind::Image, format!("{REPO}@sha256:0")),
            Metadata {
                created_at: Some(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap()),
                ..Metadata::default()
            },
        );

        let verdict = policy
            .evaluate(&ancient, &PolicyContext::default(), &deps)
            .await
            .unwrap();
        assert!(matches!(verdict, Verdict::Retain(_)));
    }
}
