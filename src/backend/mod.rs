// RpaDeck — Automation backend abstraction

pub mod factory;
pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

use crate::workflow::{ExecutionResult, Step};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Commands accepted by `/api/browser`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserCommand {
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    #[serde(default)]
    pub stream_url: Option<String>,
}

impl StreamInfo {
    /// Stream URL, if the backend offered a non-empty one.
    pub fn live_url(&self) -> Option<&str> {
        self.stream_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserSnapshot {
    #[serde(default)]
    pub screenshot: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct WorkflowRunResponse {
    #[serde(default)]
    pub results: Vec<ExecutionResult>,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Everything the client needs from the remote automation runner.
#[async_trait]
pub trait AutomationBackend: Send + Sync {
    /// Run one step; returns the raw response body.
    async fn execute_step(&self, step: &Step) -> Result<Value, BackendError>;

    /// Run an ordered list of steps in one request.
    async fn execute_workflow(&self, steps: &[Step]) -> Result<Vec<ExecutionResult>, BackendError>;

    async fn browser_command(&self, command: BrowserCommand) -> Result<(), BackendError>;

    /// `Ok` only on a 2xx answer.
    async fn health(&self) -> Result<(), BackendError>;

    async fn stream_info(&self) -> Result<StreamInfo, BackendError>;

    async fn browser_state(&self) -> Result<BrowserSnapshot, BackendError>;
}
