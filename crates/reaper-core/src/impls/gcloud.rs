//! `CloudApi` on top of the gcloud CLI.
//!
//! Every call shells out through a `CommandRunner`:
//!
//! ```text
//! gcloud --project P compute disks list --format=json [--filter=EXPR]
//! gcloud --project P compute target-pools describe NAME --region=R --format=json
//! gcloud --quiet --project P compute forwarding-rules delete NAME --region=R
//! gcloud --project P container images list-tags REPO --format=json
//! gcloud --quiet --project P container images delete REPO@DIGEST --force-delete-tags
//! ```
//!
//! JSON 出力は下の wire 構造体にデコードしてから `Candidate` に変換する。
//! gcloud のフォーマットはこのファイルの外には出さない。

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{
    Candidate, CommandError, DeletionError, Location, Metadata, QueryError, ResourceKind,
    ResourceRef,
};
use crate::ports::{CloudApi, CommandRunner, ListFilter};

const GCLOUD: &str = "gcloud";
const IMAGE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

pub struct GcloudCli<R> {
    runner: R,
    project: String,
}

impl<R: CommandRunner> GcloudCli<R> {
    pub fn new(runner: R, project: impl Into<String>) -> Self {
        Self {
            runner,
            project: project.into(),
        }
    }

    fn command(&self, quiet: bool, group: &[&str], verb: &str) -> Vec<String> {
        let mut args = Vec::new();
        if quiet {
            args.push("--quiet".to_string());
        }
        args.push("--project".to_string());
        args.push(self.project.clone());
        args.extend(group.iter().map(|s| s.to_string()));
        args.push(verb.to_string());
        args
    }

    /// Runs a read-only command and decodes its JSON output.
    async fn fetch<T: DeserializeOwned>(
        &self,
        args: &[String],
        what: &str,
        on_failure: impl FnOnce(CommandError) -> QueryError + Send,
    ) -> Result<T, QueryError> {
        let stdout = self
            .runner
            .run(GCLOUD, args)
            .await
            .map_err(on_failure)?;
        decode(&stdout, what)
    }
}

fn decode<T: DeserializeOwned>(stdout: &str, what: &str) -> Result<T, QueryError> {
    // gcloud prints nothing at all for an empty listing in some versions.
    let body = if stdout.trim().is_empty() { "[]" } else { stdout };
    serde_json::from_str(body).map_err(|e| QueryError::Decode {
        what: what.to_string(),
        reason: e.to_string(),
    })
}

fn group(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Disk => &["compute", "disks"],
        ResourceKind::TargetPool => &["compute", "target-pools"],
        ResourceKind::ForwardingRule => &["compute", "forwarding-rules"],
        ResourceKind::HttpHealthCheck => &["compute", "http-health-checks"],
        ResourceKind::FirewallRule => &["compute", "firewall-rules"],
        ResourceKind::Instance => &["compute", "instances"],
        ResourceKind::Cluster => &["container", "clusters"],
        ResourceKind::Image => &["container", "images"],
    }
}

/// The location flag a per-resource command needs, if any.
fn location_flag(id: &ResourceRef) -> Option<String> {
    match (&id.location, id.kind) {
        (Location::Global, ResourceKind::ForwardingRule) => Some("--global".to_string()),
        (Location::Global, _) => None,
        (location, _) => Some(location.cli_flag()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputeResource {
    name: String,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    users: Vec<String>,
    #[serde(default)]
    instances: Vec<String>,
    #[serde(default)]
    health_checks: Vec<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    target_tags: Vec<String>,
    #[serde(default)]
    tags: Option<NetworkTags>,
    #[serde(default)]
    creation_timestamp: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct NetworkTags {
    #[serde(default)]
    items: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterResource {
    name: String,
    location: String,
    #[serde(default)]
    create_time: Option<String>,
    #[serde(default)]
    resource_labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ImageTag {
    digest: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    timestamp: Option<ImageTimestamp>,
}

#[derive(Debug, Deserialize)]
struct ImageTimestamp {
    datetime: String,
}

fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_image_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, IMAGE_TIMESTAMP_FORMAT)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .or_else(|| parse_rfc3339(value))
}

impl ComputeResource {
    fn location(&self) -> Location {
        match (&self.zone, &self.region) {
            (Some(zone), _) => Location::from_link(zone),
            (None, Some(region)) => Location::from_link(region),
            (None, None) => Location::Global,
        }
    }

    fn metadata(self) -> Metadata {
        let target = self
            .target
            .as_deref()
            .filter(|link| link.contains("/targetPools/"))
            .and_then(|link| ResourceRef::from_link(ResourceKind::TargetPool, link));
        Metadata {
            users: self.users,
            instances: self.instances,
            health_checks: self.health_checks,
            target,
            target_tags: self.target_tags,
            network_tags: self.tags.unwrap_or_default().items,
            created_at: self.creation_timestamp.as_deref().and_then(parse_rfc3339),
            labels: self.labels,
            ..Metadata::default()
        }
    }

    fn into_candidate(self, kind: ResourceKind) -> Candidate {
        let id = ResourceRef::new(kind, self.location(), self.name.clone());
        Candidate::new(id, self.metadata())
    }
}

impl ClusterResource {
    fn into_candidate(self) -> Candidate {
        // GKE locations are either a zone (us-central1-a) or a region (us-central1).
        let zonal = self
            .location
            .rsplit('-')
            .next()
            .is_some_and(|suffix| suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_lowercase()));
        let location = if zonal {
            Location::Zone(self.location)
        } else {
            Location::Region(self.location)
        };
        Candidate::new(
            ResourceRef::new(ResourceKind::Cluster, location, self.name),
            Metadata {
                created_at: self.create_time.as_deref().and_then(parse_rfc3339),
                labels: self.resource_labels,
                ..Metadata::default()
            },
        )
    }
}

impl ImageTag {
    fn into_candidate(self, repository: &str) -> Candidate {
        Candidate::new(
            ResourceRef::global(ResourceKind::Image, format!("{repository}@{}", self.digest)),
            Metadata {
                tags: self.tags,
                created_at: self
                    .timestamp
                    .as_ref()
                    .and_then(|t| parse_image_time(&t.datetime)),
                digest: Some(self.digest),
                ..Metadata::default()
            },
        )
    }
}

#[async_trait]
impl<R: CommandRunner> CloudApi for GcloudCli<R> {
    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<Candidate>, QueryError> {
        let list_error = |source: CommandError| QueryError::List { kind, source };

        if kind == ResourceKind::Image {
            let repository = filter
                .scope
                .as_deref()
                .ok_or(QueryError::MissingScope(kind))?;
            let mut args = self.command(false, group(kind), "list-tags");
            args.push(repository.to_string());
            args.push("--format=json".to_string());
            if let Some(expression) = &filter.expression {
                args.push(format!("--filter={expression}"));
            }
            let tags: Vec<ImageTag> = self.fetch(&args, repository, list_error).await?;
            return Ok(tags
                .into_iter()
                .map(|t| t.into_candidate(repository))
                .collect());
        }

        let mut args = self.command(false, group(kind), "list");
        args.push("--format=json".to_string());
        if let Some(expression) = &filter.expression {
            args.push(format!("--filter={expression}"));
        }
        let candidates = if kind == ResourceKind::Cluster {
            let clusters: Vec<ClusterResource> =
                self.fetch(&args, kind.as_str(), list_error).await?;
            clusters
                .into_iter()
                .map(ClusterResource::into_candidate)
                .collect::<Vec<_>>()
        } else {
            let resources: Vec<ComputeResource> =
                self.fetch(&args, kind.as_str(), list_error).await?;
            resources
                .into_iter()
                .map(|r| r.into_candidate(kind))
                .collect::<Vec<_>>()
        };
        debug!(kind = %kind, count = candidates.len(), project = %self.project, "gcloud list");
        Ok(candidates)
    }

    async fn describe(&self, id: &ResourceRef) -> Result<Metadata, QueryError> {
        if matches!(id.kind, ResourceKind::Image | ResourceKind::Cluster) {
            return Err(QueryError::Unsupported {
                kind: id.kind,
                operation: "describe",
            });
        }
        let mut args = self.command(false, group(id.kind), "describe");
        args.push(id.name.clone());
        args.extend(location_flag(id));
        args.push("--format=json".to_string());

        let resource: ComputeResource = self
            .fetch(&args, &id.to_string(), |source| QueryError::Describe {
                id: id.clone(),
                source,
            })
            .await?;
        Ok(resource.metadata())
    }

    async fn delete(&self, id: &ResourceRef) -> Result<(), DeletionError> {
        let mut args = self.command(true, group(id.kind), "delete");
        args.push(id.name.clone());
        if id.kind == ResourceKind::Image {
            args.push("--force-delete-tags".to_string());
        }
        args.extend(location_flag(id));
        self.runner.run(GCLOUD, &args).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers with the first canned output whose needle occurs in the
    /// command line, and remembers every command line.
    #[derive(Default)]
    struct CannedRunner {
        outputs: Vec<(&'static str, Result<String, CommandError>)>,
        calls: Mutex<Vec<String>>,
    }

    impl CannedRunner {
        fn answer(mut self, needle: &'static str, stdout: &str) -> Self {
            self.outputs.push((needle, Ok(stdout.to_string())));
            self
        }

        fn fail(mut self, needle: &'static str) -> Self {
            self.outputs.push((
                needle,
                Err(CommandError::Failed {
                    command: needle.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "ERROR: (gcloud) permission denied".to_string(),
                }),
            ));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError> {
            let line = format!("{program} {}", args.join(" "));
            self.calls.lock().unwrap().push(line.clone());
            self.outputs
                .iter()
                .find(|(needle, _)| line.contains(needle))
                .map(|(_, out)| out.clone())
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    #[tokio::test]
    async fn disks_are_listed_with_zone_and_users() {
        let runner = CannedRunner::default().answer(
            "compute disks list",
            r#"[
              {"name": "free", "zone": "https://www.googleapis.com/compute/v1/projects/p/zones/us-east1-b"},
              {"name": "used", "zone": "https://www.googleapis.com/compute/v1/projects/p/zones/us-east1-b",
               "users": ["https://www.googleapis.com/compute/v1/projects/p/zones/us-east1-b/instances/vm"],
               "creationTimestamp": "2024-05-01T10:00:00.000-07:00"}
            ]"#,
        );
        let cloud = GcloudCli::new(runner, "p");

        let disks = cloud
            .list(ResourceKind::Disk, &ListFilter::expression("name ~ ^ci-"))
            .await
            .unwrap();

        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].location(), &Location::Zone("us-east1-b".into()));
        assert!(disks[0].metadata().users.is_empty());
        assert_eq!(disks[1].metadata().users.len(), 1);
        assert!(disks[1].metadata().created_at.is_some());
        assert_eq!(
            cloud.runner.calls(),
            ["gcloud --project p compute disks list --format=json --filter=name ~ ^ci-"]
        );
    }

    #[tokio::test]
    async fn forwarding_rules_point_at_target_pools() {
        let runner = CannedRunner::default().answer(
            "forwarding-rules list",
            r#"[
              {"name": "fr", "region": "https://www.googleapis.com/compute/v1/projects/p/regions/us-west1",
               "target": "https://www.googleapis.com/compute/v1/projects/p/regions/us-west1/targetPools/tp"},
              {"name": "proxy", "target": "https://www.googleapis.com/compute/v1/projects/p/global/targetHttpProxies/x"}
            ]"#,
        );
        let cloud = GcloudCli::new(runner, "p");

        let rules = cloud
            .list(ResourceKind::ForwardingRule, &ListFilter::default())
            .await
            .unwrap();

        assert_eq!(
            rules[0].metadata().target,
            Some(ResourceRef::new(
                ResourceKind::TargetPool,
                Location::Region("us-west1".into()),
                "tp"
            ))
        );
        assert_eq!(rules[1].location(), &Location::Global);
        assert_eq!(rules[1].metadata().target, None);
    }

    #[tokio::test]
    async fn image_tags_are_listed_per_repository() {
        let runner = CannedRunner::default().answer(
            "list-tags",
            r#"[
              {"digest": "sha256:aaa", "tags": [], "timestamp": {"datetime": "2024-01-02 03:04:05-08:00"}},
              {"digest": "sha256:bbb", "tags": ["latest"]}
            ]"#,
        );
        let cloud = GcloudCli::new(runner, "p");

        let images = cloud
            .list(ResourceKind::Image, &ListFilter::scoped("gcr.io/p/app"))
            .await
            .unwrap();

        assert_eq!(images[0].name(), "gcr.io/p/app@sha256:aaa");
        assert_eq!(
            images[0].metadata().created_at.map(|t| t.to_rfc3339()),
            Some("2024-01-02T11:04:05+00:00".to_string())
        );
        assert_eq!(images[1].metadata().tags, ["latest"]);
        assert_eq!(
            cloud.runner.calls(),
            ["gcloud --project p container images list-tags gcr.io/p/app --format=json"]
        );

        assert!(matches!(
            cloud.list(ResourceKind::Image, &ListFilter::default()).await,
            Err(QueryError::MissingScope(ResourceKind::Image))
        ));
    }

    #[tokio::test]
    async fn clusters_keep_zonal_and_regional_locations() {
        let runner = CannedRunner::default().answer(
            "container clusters list",
            r#"[
              {"name": "integration-a", "location": "us-central1-a", "createTime": "2024-05-01T00:00:00+00:00"},
              {"name": "integration-b", "location": "us-central1"}
            ]"#,
        );
        let cloud = GcloudCli::new(runner, "p");

        let clusters = cloud
            .list(ResourceKind::Cluster, &ListFilter::default())
            .await
            .unwrap();

        assert_eq!(clusters[0].location(), &Location::Zone("us-central1-a".into()));
        assert_eq!(clusters[1].location(), &Location::Region("us-central1".into()));
        assert!(clusters[0].metadata().created_at.is_some());
    }

    #[tokio::test]
    async fn deletes_carry_quiet_and_the_location_flag() {
        let cloud = GcloudCli::new(CannedRunner::default(), "p");

        let pool = ResourceRef::new(ResourceKind::TargetPool, Location::Region("r".into()), "tp");
        let check = ResourceRef::global(ResourceKind::HttpHealthCheck, "hc");
        let rule = ResourceRef::global(ResourceKind::ForwardingRule, "fr");
        let image = ResourceRef::global(ResourceKind::Image, "gcr.io/p/app@sha256:aaa");
        for id in [&pool, &check, &rule, &image] {
            cloud.delete(id).await.unwrap();
        }

        assert_eq!(
            cloud.runner.calls(),
            [
                "gcloud --quiet --project p compute target-pools delete tp --region=r",
                "gcloud --quiet --project p compute http-health-checks delete hc",
                "gcloud --quiet --project p compute forwarding-rules delete fr --global",
                "gcloud --quiet --project p container images delete gcr.io/p/app@sha256:aaa --force-delete-tags",
            ]
        );
    }

    #[tokio::test]
    async fn command_failures_map_to_the_right_error() {
        let runner = CannedRunner::default()
            .fail("disks list")
            .fail("target-pools describe")
            .fail("disks delete")
            .answer("firewall-rules list", "not json");
        let cloud = GcloudCli::new(runner, "p");

        assert!(matches!(
            cloud.list(ResourceKind::Disk, &ListFilter::default()).await,
            Err(QueryError::List { kind: ResourceKind::Disk, .. })
        ));
        assert!(matches!(
            cloud.list(ResourceKind::FirewallRule, &ListFilter::default()).await,
            Err(QueryError::Decode { .. })
        ));
        let pool = ResourceRef::new(ResourceKind::TargetPool, Location::Region("r".into()), "tp");
        assert!(matches!(
            cloud.describe(&pool).await,
            Err(QueryError::Describe { .. })
        ));
        let disk = ResourceRef::new(ResourceKind::Disk, Location::Zone("z".into()), "d");
        assert!(matches!(
            cloud.delete(&disk).await,
            Err(DeletionError::Command(CommandError::Failed { .. }))
        ));
    }

    #[tokio::test]
    async fn describe_reads_pool_members() {
        let runner = CannedRunner::default().answer(
            "target-pools describe",
            r#"{"name": "tp", "region": "https://www.googleapis.com/compute/v1/projects/p/regions/r",
                "instances": ["https://www.googleapis.com/compute/v1/projects/p/zones/r-a/instances/vm"]}"#,
        );
        let cloud = GcloudCli::new(runner, "p");
        let pool = ResourceRef::new(ResourceKind::TargetPool, Location::Region("r".into()), "tp");

        let metadata = cloud.describe(&pool).await.unwrap();

        assert_eq!(metadata.instances.len(), 1);
        assert_eq!(
            cloud.runner.calls(),
            ["gcloud --project p compute target-pools describe tp --region=r --format=json"]
        );
    }
}
