// RpaDeck — Step execution dispatcher

use crate::backend::{AutomationBackend, BackendError};
use crate::metrics::Metrics;
use crate::workflow::{ExecutionResult, Step};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("execution failed: {0}")]
    ExecutionFailed(#[from] BackendError),
    #[error("workflow has no steps to run")]
    NoSteps,
}

/// Sends steps to the backend and keeps the execution-result list.
///
/// `executing` is advisory: it tells the UI to disable run triggers. It is
/// not a lock, and the dispatcher does not queue overlapping runs.
#[derive(Clone)]
pub struct StepDispatcher {
    backend: Arc<dyn AutomationBackend>,
    executing: Arc<AtomicBool>,
    results: Arc<RwLock<Vec<ExecutionResult>>>,
    metrics: Metrics,
}

/// Clears the executing flag however the run ends.
struct ExecutingGuard<'a>(&'a AtomicBool);

impl<'a> ExecutingGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl StepDispatcher {
    pub fn new(backend: Arc<dyn AutomationBackend>, metrics: Metrics) -> Self {
        Self {
            backend,
            executing: Arc::new(AtomicBool::new(false)),
            results: Arc::new(RwLock::new(Vec::new())),
            metrics,
        }
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Pause/stop: drop the local flag only. The backend is not told.
    pub fn halt(&self) {
        if self.executing.swap(false, Ordering::SeqCst) {
            tracing::info!("Execution halted locally; backend run continues");
        }
    }

    pub async fn results(&self) -> Vec<ExecutionResult> {
        self.results.read().await.clone()
    }

    pub async fn clear_results(&self) {
        self.results.write().await.clear();
    }

    /// Run one step and append its result. Nothing is appended on failure.
    pub async fn run_step(&self, step: &Step) -> Result<ExecutionResult, DispatchError> {
        let _guard = ExecutingGuard::raise(&self.executing);
        let missing = step.missing_fields();
        if !missing.is_empty() {
            tracing::warn!(step = %step.id, kind = %step.kind, missing = ?missing, "Step config incomplete");
        }

        let started = Instant::now();
        let outcome = self.backend.execute_step(step).await;
        self.metrics
            .record_step_run(step.kind, outcome.is_ok(), started.elapsed())
            .await;

        match outcome {
            Ok(body) => {
                let result = ExecutionResult::now(&step.id, body);
                tracing::info!(
                    step = %step.id,
                    kind = %step.kind,
                    success = result.succeeded(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Step executed"
                );
                self.results.write().await.push(result.clone());
                Ok(result)
            }
            Err(e) => {
                tracing::error!(step = %step.id, kind = %step.kind, error = %e, "Step execution failed");
                Err(DispatchError::ExecutionFailed(e))
            }
        }
    }

    /// Run every step in one request. The result list is cleared up front
    /// and replaced wholesale on success; on failure it stays empty.
    pub async fn run_workflow(&self, steps: &[Step]) -> Result<Vec<ExecutionResult>, DispatchError> {
        if steps.is_empty() {
            return Err(DispatchError::NoSteps);
        }

        let _guard = ExecutingGuard::raise(&self.executing);
        self.clear_results().await;

        let started = Instant::now();
        let outcome = self.backend.execute_workflow(steps).await;
        self.metrics
            .record_workflow_run(steps.len(), outcome.is_ok(), started.elapsed())
            .await;

        match outcome {
            Ok(results) => {
                let failed = results.iter().filter(|r| !r.succeeded()).count();
                tracing::info!(
                    steps = steps.len(),
                    results = results.len(),
                    failed = failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Workflow executed"
                );
                *self.results.write().await = results.clone();
                Ok(results)
            }
            Err(e) => {
                tracing::error!(steps = steps.len(), error = %e, "Workflow execution failed");
                Err(DispatchError::ExecutionFailed(e))
            }
        }
    }
}
