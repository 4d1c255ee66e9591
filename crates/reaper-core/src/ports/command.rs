//! CommandRunner port - subprocess execution.

use async_trait::async_trait;

use crate::domain::CommandError;

/// Runs an external program and returns its stdout.
///
/// A non-zero exit status is an error carrying stderr.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<String, CommandError>;
}
