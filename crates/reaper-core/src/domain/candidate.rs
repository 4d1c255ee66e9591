//! Candidate model: one listed resource plus the metadata predicates and
//! deletions need.
//!
//! A `Candidate` is a plain record. Its external (JSON) representation is
//! built explicitly by [`Candidate::to_json`], so the shape used inside the
//! reaper never has to follow the provider's wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use super::resource::{Location, ResourceKind, ResourceRef};

/// Everything the reaper may need to know about a resource.
///
/// Fields that don't apply to a kind stay empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    /// Instances a disk is attached to.
    pub users: Vec<String>,

    /// Member instance URLs of a target pool.
    pub instances: Vec<String>,

    /// Health checks referenced by a target pool (names).
    pub health_checks: Vec<String>,

    /// What a forwarding rule points at.
    pub target: Option<ResourceRef>,

    /// Target tags of a firewall rule.
    pub target_tags: Vec<String>,

    /// Network tags carried by an instance.
    pub network_tags: Vec<String>,

    /// Tags of a container image.
    pub tags: Vec<String>,

    /// Digest of a container image.
    pub digest: Option<String>,

    pub created_at: Option<DateTime<Utc>>,

    pub labels: BTreeMap<String, String>,
}

/// A resource eligible for evaluation. Immutable once listed.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    id: ResourceRef,
    metadata: Metadata,
}

impl Candidate {
    pub fn new(id: ResourceRef, metadata: Metadata) -> Self {
        Self { id, metadata }
    }

    /// Shorthand for a candidate with empty metadata.
    pub fn bare(kind: ResourceKind, location: Location, name: impl Into<String>) -> Self {
        Self::new(ResourceRef::new(kind, location, name), Metadata::default())
    }

    pub fn id(&self) -> &ResourceRef {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.id.kind
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn location(&self) -> &Location {
        &self.id.location
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// External representation used by dry-run listings and JSON reports.
    ///
    /// Empty collections and unset options are left out.
    pub fn to_json(&self) -> serde_json::Value {
        let m = &self.metadata;
        let mut object = serde_json::Map::new();
        object.insert("kind".to_string(), json!(self.id.kind.as_str()));
        object.insert("name".to_string(), json!(self.id.name));
        object.insert("location".to_string(), json!(self.id.location.to_string()));

        let lists = [
            ("users", &m.users),
            ("instances", &m.instances),
            ("healthChecks", &m.health_checks),
            ("targetTags", &m.target_tags),
            ("networkTags", &m.network_tags),
            ("tags", &m.tags),
        ];
        for (key, list) in lists {
            if !list.is_empty() {
                object.insert(key.to_string(), json!(list));
            }
        }
        if let Some(target) = &m.target {
            object.insert("target".to_string(), json!(target.to_string()));
        }
        if let Some(digest) = &m.digest {
            object.insert("digest".to_string(), json!(digest));
        }
        if let Some(created_at) = m.created_at {
            object.insert("createdAt".to_string(), json!(created_at.to_rfc3339()));
        }
        if !m.labels.is_empty() {
            object.insert("labels".to_string(), json!(m.labels));
        }
        serde_json::Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn to_json_omits_empty_fields() {
        let c = Candidate::bare(ResourceKind::Disk, Location::Zone("us-east1-b".into()), "d-1");
        let v = c.to_json();
        assert_eq!(v["kind"], "disk");
        assert_eq!(v["name"], "d-1");
        assert_eq!(v["location"], "us-east1-b");
        assert!(v.get("users").is_none());
        assert!(v.get("createdAt").is_none());
    }

    #[test]
    fn to_json_carries_populated_metadata() {
        let metadata = Metadata {
            users: vec!["instance-1".to_string()],
            target: Some(ResourceRef::new(
                ResourceKind::TargetPool,
                Location::Region("us-east1".into()),
                "tp",
            )),
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..Metadata::default()
        };
        let c = Candidate::new(
            ResourceRef::new(ResourceKind::Disk, Location::Zone("z".into()), "d-2"),
            metadata,
        );
        let v = c.to_json();
        assert_eq!(v["users"], json!(["instance-1"]));
        assert_eq!(v["target"], "target-pool/us-east1/tp");
        assert_eq!(v["createdAt"], "2024-01-01T00:00:00+00:00");
    }
}
