//! Resource identity: what kind of thing, where it lives, what it is called.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The resource collections the reaper knows how to clean up.
///
/// Serialized (and parsed from the config file / CLI) as kebab-case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Disk,
    TargetPool,
    ForwardingRule,
    HttpHealthCheck,
    FirewallRule,
    Image,
    Cluster,
    /// Listed for lookups (firewall tags); never reaped itself.
    Instance,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Disk,
        ResourceKind::TargetPool,
        ResourceKind::ForwardingRule,
        ResourceKind::HttpHealthCheck,
        ResourceKind::FirewallRule,
        ResourceKind::Image,
        ResourceKind::Cluster,
        ResourceKind::Instance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Disk => "disk",
            ResourceKind::TargetPool => "target-pool",
            ResourceKind::ForwardingRule => "forwarding-rule",
            ResourceKind::HttpHealthCheck => "http-health-check",
            ResourceKind::FirewallRule => "firewall-rule",
            ResourceKind::Image => "image",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Instance => "instance",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Where a resource lives.
///
/// Ordering is Global < Region < Zone, then by name, which keeps reports
/// stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "scope", content = "name", rename_all = "lowercase")]
pub enum Location {
    Global,
    Region(String),
    Zone(String),
}

impl Location {
    /// Extracts the location from a provider self-link such as
    /// `https://www.googleapis.com/compute/v1/projects/p/regions/us-east1/targetPools/tp`.
    ///
    /// Links carrying neither a `regions/` nor a `zones/` segment are global.
    pub fn from_link(link: &str) -> Self {
        let mut segments = link.split('/');
        while let Some(segment) = segments.next() {
            match (segment, segments.clone().next()) {
                ("regions", Some(name)) if !name.is_empty() => {
                    return Location::Region(name.to_string());
                }
                ("zones", Some(name)) if !name.is_empty() => {
                    return Location::Zone(name.to_string());
                }
                _ => {}
            }
        }
        Location::Global
    }

    /// The gcloud flag that scopes a command to this location.
    pub fn cli_flag(&self) -> String {
        match self {
            Location::Global => "--global".to_string(),
            Location::Region(name) => format!("--region={name}"),
            Location::Zone(name) => format!("--zone={name}"),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Global => f.write_str("global"),
            Location::Region(name) | Location::Zone(name) => f.write_str(name),
        }
    }
}

/// Identity of a Candidate: two refs are the same resource iff kind,
/// location and name all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub location: Location,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, location: Location, name: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            name: name.into(),
        }
    }

    pub fn global(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::new(kind, Location::Global, name)
    }

    /// Builds a ref from the last path segment of a self-link.
    ///
    /// Returns `None` for an empty link.
    pub fn from_link(kind: ResourceKind, link: &str) -> Option<Self> {
        let name = link.trim_end_matches('/').rsplit('/').next()?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(kind, Location::from_link(link), name))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.location, self.name)
    }
}
