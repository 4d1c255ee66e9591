//! LivenessProbe port - is the instance behind a URL still there?

use async_trait::async_trait;

use crate::domain::EvaluationError;

/// Issues a GET against an instance's API URL and reports the HTTP status.
///
/// 200 means the instance exists; anything else (typically 404) means it is
/// gone. Transport failures are `EvaluationError`s, which keep the owning
/// resource out of the batch.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, instance_url: &str) -> Result<u16, EvaluationError>;
}
