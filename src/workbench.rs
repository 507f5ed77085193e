// RpaDeck — Workbench: the editor's view over the store, dispatcher and session

use crate::backend::BackendError;
use crate::dispatch::{DispatchError, StepDispatcher};
use crate::monitor::SessionMonitor;
use crate::workflow::{ExecutionResult, Step, StepDraft, StepType, StoreError, WorkflowStore};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("a run is already in progress")]
    Busy,
    #[error("no workflow is open")]
    NoCurrentWorkflow,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("browser reset failed: {0}")]
    Reset(#[from] BackendError),
}

/// Actions offered by the browser control bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserControl {
    RunWorkflow,
    PauseWorkflow,
    StopWorkflow,
    ResetBrowser,
    TakeControl,
}

impl fmt::Display for BrowserControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BrowserControl::RunWorkflow => "run_workflow",
            BrowserControl::PauseWorkflow => "pause_workflow",
            BrowserControl::StopWorkflow => "stop_workflow",
            BrowserControl::ResetBrowser => "reset_browser",
            BrowserControl::TakeControl => "take_control",
        })
    }
}

impl FromStr for BrowserControl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "run" | "run_workflow" => Ok(BrowserControl::RunWorkflow),
            "pause" | "pause_workflow" => Ok(BrowserControl::PauseWorkflow),
            "stop" | "stop_workflow" => Ok(BrowserControl::StopWorkflow),
            "reset" | "reset_browser" => Ok(BrowserControl::ResetBrowser),
            "take" | "take_control" => Ok(BrowserControl::TakeControl),
            other => Err(format!("unknown browser control '{}'", other)),
        }
    }
}

pub struct Workbench {
    pub store: WorkflowStore,
    pub dispatcher: StepDispatcher,
}

impl Workbench {
    pub fn new(store: WorkflowStore, dispatcher: StepDispatcher) -> Self {
        Self { store, dispatcher }
    }

    fn current_id(&self) -> Result<String, WorkbenchError> {
        self.store
            .current_id()
            .map(String::from)
            .ok_or(WorkbenchError::NoCurrentWorkflow)
    }

    /// Append a step of `kind` with its default title and description.
    pub fn add_step_of_kind(&mut self, kind: StepType) -> Result<Step, WorkbenchError> {
        let id = self.current_id()?;
        Ok(self.store.add_step(&id, StepDraft::new(kind))?)
    }

    pub async fn run_step(&self, step_id: &str) -> Result<ExecutionResult, WorkbenchError> {
        if self.dispatcher.is_executing() {
            return Err(WorkbenchError::Busy);
        }
        let workflow = self
            .store
            .current_workflow()
            .ok_or(WorkbenchError::NoCurrentWorkflow)?;
        let step = workflow.step(step_id).cloned().ok_or_else(|| StoreError::StepNotFound {
            workflow: workflow.id.clone(),
            step: step_id.to_string(),
        })?;
        Ok(self.dispatcher.run_step(&step).await?)
    }

    /// Run the open workflow. Refused while another run is in flight.
    pub async fn run_workflow(&self) -> Result<Vec<ExecutionResult>, WorkbenchError> {
        if self.dispatcher.is_executing() {
            return Err(WorkbenchError::Busy);
        }
        let steps = self
            .store
            .current_workflow()
            .ok_or(WorkbenchError::NoCurrentWorkflow)?
            .steps
            .clone();
        Ok(self.dispatcher.run_workflow(&steps).await?)
    }

    /// Reset the remote browser and forget local results. On failure nothing
    /// local changes.
    pub async fn reset_session(&self, monitor: &SessionMonitor) -> Result<(), WorkbenchError> {
        monitor.reset().await?;
        self.dispatcher.halt();
        self.dispatcher.clear_results().await;
        Ok(())
    }

    pub async fn browser_control(
        &self,
        action: BrowserControl,
        monitor: &SessionMonitor,
    ) -> Result<(), WorkbenchError> {
        tracing::info!(action = %action, "Browser control");
        match action {
            BrowserControl::RunWorkflow => self.run_workflow().await.map(|_| ()),
            BrowserControl::PauseWorkflow | BrowserControl::StopWorkflow => {
                self.dispatcher.halt();
                Ok(())
            }
            BrowserControl::ResetBrowser => self.reset_session(monitor).await,
            BrowserControl::TakeControl => {
                tracing::info!("Manual control requested; interact through the live stream");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::ScriptedBackend;
    use crate::backend::BrowserCommand;
    use crate::metrics::Metrics;
    use crate::monitor::MonitorIntervals;
    use crate::workflow::StepConfig;
    use std::sync::Arc;

    fn bench(backend: Arc<ScriptedBackend>) -> Workbench {
        let mut store = WorkflowStore::new();
        let wf = store.create_workflow("Login", "");
        store.load_workflow(&wf.id);
        Workbench::new(store, StepDispatcher::new(backend, Metrics::new()))
    }

    #[tokio::test]
    async fn test_add_step_requires_open_workflow() {
        let mut wb = Workbench::new(
            WorkflowStore::new(),
            StepDispatcher::new(ScriptedBackend::healthy(), Metrics::new()),
        );
        assert!(matches!(
            wb.add_step_of_kind(StepType::Click),
            Err(WorkbenchError::NoCurrentWorkflow)
        ));
    }

    #[tokio::test]
    async fn test_add_and_run_step() {
        let mut wb = bench(ScriptedBackend::healthy());
        let step = wb.add_step_of_kind(StepType::Navigate).unwrap();
        assert_eq!(step.title, "Navigate to URL");
        assert_eq!(step.order, 1);

        let wf_id = wb.store.current_id().unwrap().to_string();
        wb.store
            .update_step(
                &wf_id,
                &step.id,
                crate::workflow::StepPatch {
                    config: Some(StepConfig::navigate("https://example.com")),
                    ..Default::default()
                },
            )
            .unwrap();

        let result = wb.run_step(&step.id).await.unwrap();
        assert_eq!(result.step_id, step.id);
        assert_eq!(wb.dispatcher.results().await.len(), 1);
    }

    #[tokio::test]
    async fn test_run_unknown_step() {
        let wb = bench(ScriptedBackend::healthy());
        assert!(matches!(
            wb.run_step("nope").await,
            Err(WorkbenchError::Store(StoreError::StepNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_run_empty_workflow_is_rejected() {
        let wb = bench(ScriptedBackend::healthy());
        assert!(matches!(
            wb.run_workflow().await,
            Err(WorkbenchError::Dispatch(DispatchError::NoSteps))
        ));
    }

    #[tokio::test]
    async fn test_reset_and_controls() {
        let backend = ScriptedBackend::healthy();
        let mut wb = bench(backend.clone());
        wb.add_step_of_kind(StepType::Screenshot).unwrap();
        let monitor = SessionMonitor::new(backend.clone(), MonitorIntervals::default(), Metrics::new());

        wb.browser_control(BrowserControl::RunWorkflow, &monitor)
            .await
            .unwrap();
        assert_eq!(wb.dispatcher.results().await.len(), 1);

        wb.browser_control(BrowserControl::TakeControl, &monitor)
            .await
            .unwrap();
        assert!(backend.commands.lock().unwrap().is_empty());

        wb.browser_control(BrowserControl::ResetBrowser, &monitor)
            .await
            .unwrap();
        assert!(wb.dispatcher.results().await.is_empty());
        assert_eq!(*backend.commands.lock().unwrap(), vec![BrowserCommand::Reset]);
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_results() {
        let backend = ScriptedBackend::healthy();
        *backend.reset_status.lock().unwrap() = Some(500);
        let mut wb = bench(backend.clone());
        wb.add_step_of_kind(StepType::Screenshot).unwrap();
        wb.run_workflow().await.unwrap();
        let monitor = SessionMonitor::new(backend, MonitorIntervals::default(), Metrics::new());

        let err = wb.reset_session(&monitor).await.unwrap_err();
        assert!(matches!(
            err,
            WorkbenchError::Reset(BackendError::Status { status: 500, .. })
        ));
        assert!(err.to_string().starts_with("browser reset failed"));
        assert_eq!(wb.dispatcher.results().await.len(), 1);
    }

    #[test]
    fn test_browser_control_parse() {
        assert_eq!("pause".parse::<BrowserControl>().unwrap(), BrowserControl::PauseWorkflow);
        assert_eq!(
            "reset-browser".parse::<BrowserControl>().unwrap(),
            BrowserControl::ResetBrowser
        );
        assert!("fly".parse::<BrowserControl>().is_err());
    }
}
