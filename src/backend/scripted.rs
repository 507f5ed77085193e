// Scripted in-memory backend for dispatcher and monitor tests.

use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Default)]
pub(crate) struct ScriptedBackend {
    pub healthy: AtomicBool,
    pub stream_url: Mutex<Option<String>>,
    pub stream_unreachable: AtomicBool,
    pub snapshot: Mutex<Option<BrowserSnapshot>>,
    /// When set, `browser_state` parks until notified.
    pub snapshot_gate: Mutex<Option<Arc<Notify>>>,
    pub step_status: Mutex<Option<u16>>,
    pub workflow_status: Mutex<Option<u16>>,
    pub reset_status: Mutex<Option<u16>>,
    pub snapshot_calls: AtomicUsize,
    pub health_calls: AtomicUsize,
    pub commands: Mutex<Vec<BrowserCommand>>,
}

impl ScriptedBackend {
    pub fn healthy() -> Arc<Self> {
        let backend = Self::default();
        backend.healthy.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn set_stream(&self, url: Option<&str>) {
        *self.stream_url.lock().unwrap() = url.map(String::from);
    }

    pub fn set_snapshot(&self, screenshot: &str, url: Option<&str>) {
        *self.snapshot.lock().unwrap() = Some(BrowserSnapshot {
            screenshot: Some(screenshot.to_string()),
            url: url.map(String::from),
        });
    }
}

fn fail(status: Option<u16>) -> Result<(), BackendError> {
    match status {
        Some(status) => Err(BackendError::Status {
            status,
            body: "scripted failure".into(),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl AutomationBackend for ScriptedBackend {
    async fn execute_step(&self, step: &Step) -> Result<Value, BackendError> {
        fail(*self.step_status.lock().unwrap())?;
        Ok(serde_json::json!({
            "success": true,
            "result": { "success": true, "message": format!("ran {}", step.kind) },
        }))
    }

    async fn execute_workflow(&self, steps: &[Step]) -> Result<Vec<ExecutionResult>, BackendError> {
        fail(*self.workflow_status.lock().unwrap())?;
        Ok(steps
            .iter()
            .map(|s| ExecutionResult {
                step_id: s.id.clone(),
                result: serde_json::json!({ "success": true }),
                timestamp: "2026-01-01T00:00:00".into(),
            })
            .collect())
    }

    async fn browser_command(&self, command: BrowserCommand) -> Result<(), BackendError> {
        fail(*self.reset_status.lock().unwrap())?;
        self.commands.lock().unwrap().push(command);
        Ok(())
    }

    async fn health(&self) -> Result<(), BackendError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Status {
                status: 503,
                body: "down".into(),
            })
        }
    }

    async fn stream_info(&self) -> Result<StreamInfo, BackendError> {
        if self.stream_unreachable.load(Ordering::SeqCst) {
            return Err(BackendError::Decode("unreachable".into()));
        }
        Ok(StreamInfo {
            stream_url: self.stream_url.lock().unwrap().clone(),
        })
    }

    async fn browser_state(&self) -> Result<BrowserSnapshot, BackendError> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.snapshot_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.snapshot.lock().unwrap().clone().unwrap_or_default())
    }
}
