//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use reaper_core::app::ReaperConfig;
use reaper_core::domain::ResourceKind;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deletes abandoned cloud resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: ~/.config/reaper/config.toml, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Report what would be deleted without deleting anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Maximum number of deletions in flight
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Per-delete timeout in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Let every delete run for as long as it takes
    #[arg(long, global = true, conflicts_with = "timeout")]
    pub no_timeout: bool,

    /// Log record format (stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Summary format (stdout)
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Delete disks no instance is attached to
    Disks { project: String },

    /// Delete target pools whose instances are all gone (and their forwarding rules)
    TargetPools { project: String },

    /// Delete HTTP health checks no target pool references
    HealthChecks { project: String },

    /// Target pools, then health checks
    LoadBalancers { project: String },

    /// Delete firewall rules whose target tags no instance carries
    FirewallRules { project: String },

    /// Delete untagged container images
    Images {
        project: String,

        /// Image repository, e.g. gcr.io/my-project/app
        #[arg(long)]
        repository: Option<String>,

        /// Only images older than this
        #[arg(long)]
        min_age_hours: Option<u64>,
    },

    /// Delete leftover test clusters
    Clusters {
        project: String,

        #[arg(long)]
        name_prefix: Option<String>,

        /// Only clusters older than this
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
}

impl Command {
    pub fn project(&self) -> &str {
        match self {
            Command::Disks { project }
            | Command::TargetPools { project }
            | Command::HealthChecks { project }
            | Command::LoadBalancers { project }
            | Command::FirewallRules { project }
            | Command::Images { project, .. }
            | Command::Clusters { project, .. } => project,
        }
    }

    /// Kinds reaped by this command, in batch order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        match self {
            Command::Disks { .. } => vec![ResourceKind::Disk],
            Command::TargetPools { .. } => vec![ResourceKind::TargetPool],
            Command::HealthChecks { .. } => vec![ResourceKind::HttpHealthCheck],
            Command::LoadBalancers { .. } => {
                vec![ResourceKind::TargetPool, ResourceKind::HttpHealthCheck]
            }
            Command::FirewallRules { .. } => vec![ResourceKind::FirewallRule],
            Command::Images { .. } => vec![ResourceKind::Image],
            Command::Clusters { .. } => vec![ResourceKind::Cluster],
        }
    }

    /// Whether evaluation needs the instance liveness probe.
    pub fn needs_probe(&self) -> bool {
        self.kinds().contains(&ResourceKind::TargetPool)
    }
}

impl Cli {
    /// Applies flags on top of the file configuration. Flags win.
    pub fn apply(&self, config: &mut ReaperConfig) {
        if self.dry_run {
            config.dry_run = true;
        }
        if let Some(n) = self.concurrency {
            config.concurrency = Some(n as usize);
        }
        if let Some(secs) = self.timeout {
            config.task_timeout_secs = secs;
            config.disable_task_timeout = false;
        }
        if self.no_timeout {
            config.disable_task_timeout = true;
        }
        match &self.command {
            Command::Images {
                repository,
                min_age_hours,
                ..
            } => {
                if let Some(repository) = repository {
                    config.images.repository = Some(repository.clone());
                }
                if let Some(hours) = min_age_hours {
                    config.images.min_age_hours = *hours;
                }
            }
            Command::Clusters {
                name_prefix,
                max_age_hours,
                ..
            } => {
                if let Some(prefix) = name_prefix {
                    config.clusters.name_prefix = prefix.clone();
                }
                if let Some(hours) = max_age_hours {
                    config.clusters.max_age_hours = *hours;
                }
            }
            _ => {}
        }
    }
}
