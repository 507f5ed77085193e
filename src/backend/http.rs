// RpaDeck — HTTP automation backend (reqwest)

use super::*;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

pub const EXECUTE_STEP: &str = "/api/execute-step";
pub const EXECUTE_WORKFLOW: &str = "/api/execute-workflow";
pub const BROWSER_CONTROL: &str = "/api/browser";
pub const HEALTH: &str = "/api/health";
pub const BROWSER_STREAM_INFO: &str = "/api/browser-stream-info";
pub const BROWSER_STATE: &str = "/api/browser-state";

/// HttpBackend speaks the automation runner's JSON API.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.endpoint(path);
        tracing::trace!(url = %url, "GET");
        let response = checked(self.client.get(&url).send().await?).await?;
        decode(response).await
    }
}

/// Turn a non-2xx response into `BackendError::Status`.
async fn checked(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "could not read body".to_string());
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

#[async_trait]
impl AutomationBackend for HttpBackend {
    async fn execute_step(&self, step: &Step) -> Result<Value, BackendError> {
        let url = self.endpoint(EXECUTE_STEP);
        tracing::debug!(url = %url, step = %step.id, kind = %step.kind, "Sending step");

        let response = self.client.post(&url).json(step).send().await?;
        let response = checked(response).await?;
        decode(response).await
    }

    async fn execute_workflow(&self, steps: &[Step]) -> Result<Vec<ExecutionResult>, BackendError> {
        let url = self.endpoint(EXECUTE_WORKFLOW);
        tracing::debug!(url = %url, steps = steps.len(), "Sending workflow");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "steps": steps }))
            .send()
            .await?;
        let response = checked(response).await?;
        let body: WorkflowRunResponse = decode(response).await?;
        Ok(body.results)
    }

    async fn browser_command(&self, command: BrowserCommand) -> Result<(), BackendError> {
        let url = self.endpoint(BROWSER_CONTROL);
        tracing::debug!(url = %url, command = ?command, "Sending browser command");

        let response = self
            .client
            .post(&url)
            .json(&json!({ "command": command }))
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }

    async fn health(&self) -> Result<(), BackendError> {
        let response = self.client.get(self.endpoint(HEALTH)).send().await?;
        checked(response).await?;
        Ok(())
    }

    async fn stream_info(&self) -> Result<StreamInfo, BackendError> {
        self.get_json(BROWSER_STREAM_INFO).await
    }

    async fn browser_state(&self) -> Result<BrowserSnapshot, BackendError> {
        self.get_json(BROWSER_STATE).await
    }
}
