//! App - application layer.
//!
//! Combines the ports into the reaping workflow.
//!
//! # Components
//! - **ReaperBuilder**: wiring and startup validation
//! - **Reaper**: runs one batch per resource kind
//! - **Listing**: the candidates of one batch
//! - **BoundedExecutor**: deletes with a fixed concurrency ceiling
//! - **OutcomeCollector**: the batch's shared result table
//! - **PolicyRegistry**: resource kind -> reap policy
//! - **ReaperConfig**: TOML configuration

pub mod batch;
pub mod builder;
pub mod collector;
pub mod config;
pub mod executor;
pub mod lister;
pub mod registry;

pub use self::batch::Reaper;
pub use self::builder::{BuildError, ReaperBuilder};
pub use self::collector::OutcomeCollector;
pub use self::config::ReaperConfig;
pub use self::executor::{BoundedExecutor, CancelHandle, ExecutorConfig};
pub use self::lister::Listing;
pub use self::registry::PolicyRegistry;
