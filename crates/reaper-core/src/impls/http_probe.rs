//! Liveness probe over HTTPS with a bearer token.
//!
//! Instance self-links are compute API URLs; a GET on one answers 200 while
//! the instance exists and 404 once it is gone.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, trace};

use crate::domain::{CommandError, EvaluationError};
use crate::ports::{CommandRunner, LivenessProbe};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ProbeSetupError {
    #[error("cannot obtain an access token: {0}")]
    Token(#[from] CommandError),

    #[error("access token is empty")]
    EmptyToken,

    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpLivenessProbe {
    client: Client,
    token: String,
}

impl HttpLivenessProbe {
    pub fn new(token: impl Into<String>) -> Result<Self, ProbeSetupError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ProbeSetupError::EmptyToken);
        }
        let client = Client::builder().timeout(PROBE_TIMEOUT).build()?;
        Ok(Self { client, token })
    }

    /// Fetches the token once with `gcloud auth print-access-token`.
    pub async fn from_gcloud<R: CommandRunner>(
        runner: &R,
        project: &str,
    ) -> Result<Self, ProbeSetupError> {
        let args = ["--project", project, "auth", "print-access-token"].map(String::from);
        let token = runner.run("gcloud", &args).await?;
        debug!("obtained access token for liveness probes");
        Self::new(token.trim())
    }
}

#[async_trait]
impl LivenessProbe for HttpLivenessProbe {
    async fn probe(&self, instance_url: &str) -> Result<u16, EvaluationError> {
        let response = self
            .client
            .get(instance_url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| EvaluationError::Probe {
                url: instance_url.to_string(),
                reason: e.to_string(),
            })?;
        let status = response.status().as_u16();
        trace!(url = instance_url, status, "probed");
        Ok(status)
    }
}
