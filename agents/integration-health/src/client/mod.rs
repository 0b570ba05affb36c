//! Client for invoking the Integration Health Agent remotely
//!
//! Used by pipelines and components to report telemetry and consult gates.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::contracts::*;
use synapse_core::{EvaluationOutcome, GateVerdict, SystemHealth, TelemetrySample};

/// Integration Health Agent client
pub struct IntegrationHealthClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl IntegrationHealthClient {
    /// Create new client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_millis(1500),
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report one telemetry sample and get the evaluation back
    pub async fn ingest(
        &self,
        sample: &TelemetrySample,
    ) -> Result<ClientResponse<EvaluationOutcome>, ClientError> {
        self.send(self.client.post(self.url("/api/v1/telemetry")).json(sample))
            .await
    }

    /// Pre-commit verdict for a project
    pub async fn can_proceed_with_commit(
        &self,
        request: &CommitCheckRequest,
    ) -> Result<bool, ClientError> {
        let response: ClientResponse<CommitCheckResponse> = self
            .send(self.client.post(self.url("/api/v1/gates/commit")).json(request))
            .await?;
        Ok(response.data.allowed)
    }

    /// Deployment verdict for a project
    pub async fn can_proceed_with_deployment(&self, project_id: &str) -> Result<bool, ClientError> {
        let request = DeploymentCheckRequest {
            project_id: project_id.to_string(),
        };
        let response: ClientResponse<GateVerdict> = self
            .send(
                self.client
                    .post(self.url("/api/v1/gates/deployment"))
                    .json(&request),
            )
            .await?;
        Ok(response.data.allowed)
    }

    pub async fn system_health(&self) -> Result<SystemHealth, ClientError> {
        let response: ClientResponse<SystemHealth> = self
            .send(self.client.get(self.url("/api/v1/system/health")))
            .await?;
        Ok(response.data)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<ClientResponse<T>, ClientError> {
        let response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if response.status().is_success() {
            let data: ApiResponse<T> = response
                .json()
                .await
                .map_err(|e| ClientError::Parse(e.to_string()))?;

            Ok(ClientResponse {
                success: data.success,
                data: data.data,
                request_id: data.request_id,
            })
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&error_text)
                .map(|e| e.message)
                .unwrap_or(error_text);
            Err(ClientError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    request_id: uuid::Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client response
#[derive(Debug)]
pub struct ClientResponse<T> {
    pub success: bool,
    pub data: T,
    pub request_id: uuid::Uuid,
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
}
