//! Impls - adapters for the ports.
//!
//! # Production
//! - **GcloudCli**: `CloudApi` through the gcloud CLI
//! - **TokioCommandRunner**: subprocesses on `tokio::process`
//! - **HttpLivenessProbe**: instance liveness over HTTPS (reqwest)
//!
//! # Tests and local runs
//! - **InMemoryCloud** / **StaticProbe**

pub mod gcloud;
pub mod http_probe;
pub mod memory;
pub mod process;

pub use self::gcloud::GcloudCli;
pub use self::http_probe::{HttpLivenessProbe, ProbeSetupError};
pub use self::memory::{InMemoryCloud, StaticProbe};
pub use self::process::TokioCommandRunner;
