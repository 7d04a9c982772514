use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use tts_job_domain::{AcceleratorPort, DomainError};

const SERVICE: &str = "accelerator";

/// CPU execution: there is no device cache to reclaim.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAccelerator;

#[async_trait]
impl AcceleratorPort for NoopAccelerator {
    fn name(&self) -> &str {
        "none"
    }

    async fn reclaim_memory(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

/// Accelerator runtime that lives next to the model server and exposes a
/// cache-reclamation endpoint.
pub struct RemoteAccelerator {
    client: Client,
    url: String,
}

impl RemoteAccelerator {
    pub fn new(endpoint: &str, reclaim_path: &str, timeout: Duration) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DomainError::external_service_error(SERVICE, &err.to_string()))?;

        Ok(Self {
            client,
            url: format!(
                "{}/{}",
                endpoint.trim_end_matches('/'),
                reclaim_path.trim_start_matches('/')
            ),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AcceleratorPort for RemoteAccelerator {
    fn name(&self) -> &str {
        "remote"
    }

    async fn reclaim_memory(&self) -> Result<(), DomainError> {
        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|err| DomainError::external_service_error(SERVICE, &err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::external_service_error(
                SERVICE,
                &format!("reclaim request failed with status {status}"),
            ));
        }
        Ok(())
    }
}
