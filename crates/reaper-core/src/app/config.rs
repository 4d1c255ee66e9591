//! Reaper configuration.
//!
//! Loaded from TOML; every field has a default so an absent file is a valid
//! configuration. Precedence is CLI flag > config file > policy default.
//!
//! ```toml
//! concurrency = 8
//! task_timeout_secs = 300
//!
//! [kinds.image]
//! concurrency = 16
//!
//! [kinds.disk]
//! filter = "name ~ ^ci-"
//!
//! [images]
//! repository = "gcr.io/my-project/ci"
//! min_age_hours = 72
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ConfigError, ResourceKind};
use crate::ports::ListFilter;

pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Overrides every policy's default concurrency.
    pub concurrency: Option<usize>,

    /// Per-delete timeout.
    pub task_timeout_secs: u64,

    /// Lets a delete call run for as long as it takes.
    pub disable_task_timeout: bool,

    pub dry_run: bool,

    /// Per-kind settings, keyed by kind name (`disk`, `target-pool`, ...).
    pub kinds: BTreeMap<String, KindConfig>,

    pub images: ImageConfig,

    pub clusters: ClusterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindConfig {
    pub concurrency: Option<usize>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub repository: Option<String>,
    pub min_age_hours: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            repository: None,
            min_age_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub name_prefix: String,
    pub max_age_hours: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name_prefix: "integration-".to_string(),
            max_age_hours: 24,
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            disable_task_timeout: false,
            dry_run: false,
            kinds: BTreeMap::new(),
            images: ImageConfig::default(),
            clusters: ClusterConfig::default(),
        }
    }
}

impl ReaperConfig {
    /// Loads the configuration.
    ///
    /// - `Some(path)`: the file must exist.
    /// - `None`: `$HOME/.config/reaper/config.toml` if present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(PathBuf::from(home).join(".config/reaper/config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.task_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "task_timeout_secs must be at least 1 (use disable_task_timeout instead)".into(),
            ));
        }
        for (name, kind) in &self.kinds {
            name.parse::<ResourceKind>()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if kind.concurrency == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "kinds.{name}.concurrency must be at least 1"
                )));
            }
        }
        Ok(())
    }

    fn kind(&self, kind: ResourceKind) -> Option<&KindConfig> {
        self.kinds.get(kind.as_str())
    }

    /// Effective concurrency: global override, then the kind's setting, then
    /// the policy default.
    pub fn concurrency_for(&self, kind: ResourceKind, policy_default: usize) -> usize {
        self.concurrency
            .or_else(|| self.kind(kind).and_then(|k| k.concurrency))
            .unwrap_or(policy_default)
            .max(1)
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        if self.disable_task_timeout {
            None
        } else {
            Some(Duration::from_secs(self.task_timeout_secs))
        }
    }

    pub fn filter_for(&self, kind: ResourceKind) -> ListFilter {
        ListFilter {
            expression: self.kind(kind).and_then(|k| k.filter.clone()),
            scope: None,
        }
    }
}
