// RpaDeck — Workflow store (canonical in-memory workflows, JSON persistence)

use super::template::TemplateImporter;
use super::{Step, StepDraft, StepPatch, Workflow, WorkflowPatch};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("step {step} not found in workflow {workflow}")]
    StepNotFound { workflow: String, step: String },
    #[error("{0}")]
    Validation(String),
}

impl StoreError {
    /// Unknown ids are expected to be impossible from the editor, so callers
    /// usually treat them as a no-op rather than an error to show.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::WorkflowNotFound(_) | StoreError::StepNotFound { .. }
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSnapshot {
    #[serde(default)]
    workflows: Vec<Workflow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_workflow_id: Option<String>,
}

/// Owns every workflow and the editor's current selection. The mutation
/// methods are the only write path; each one either applies fully or leaves
/// the store untouched.
#[derive(Debug, Default)]
pub struct WorkflowStore {
    workflows: Vec<Workflow>,
    current: Option<String>,
    importer: TemplateImporter,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    pub fn get(&self, id: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.id == id)
    }

    pub fn current_workflow(&self) -> Option<&Workflow> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Select the workflow the editor operates on.
    pub fn load_workflow(&mut self, id: &str) -> Option<&Workflow> {
        if self.get(id).is_none() {
            tracing::debug!(workflow = %id, "load_workflow: unknown id");
            return None;
        }
        self.current = Some(id.to_string());
        self.get(id)
    }

    pub fn create_workflow(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Workflow {
        let now = Utc::now();
        let workflow = Workflow {
            id: self.fresh_workflow_id(),
            name: name.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
            steps: Vec::new(),
        };
        tracing::debug!(workflow = %workflow.id, name = %workflow.name, "Workflow created");
        self.workflows.push(workflow.clone());
        workflow
    }

    pub fn update_workflow(&mut self, id: &str, patch: WorkflowPatch) -> Result<(), StoreError> {
        let workflow = self.workflow_mut(id)?;
        if let Some(name) = patch.name {
            workflow.name = name;
        }
        if let Some(description) = patch.description {
            workflow.description = description;
        }
        workflow.updated_at = Utc::now();
        Ok(())
    }

    pub fn delete_workflow(&mut self, id: &str) -> Result<Workflow, StoreError> {
        let idx = self
            .workflows
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| not_found_workflow(id))?;
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        Ok(self.workflows.remove(idx))
    }

    pub fn add_step(&mut self, workflow_id: &str, draft: StepDraft) -> Result<Step, StoreError> {
        let workflow = self.workflow_mut(workflow_id)?;

        let mut id = format!("step-{}", uuid::Uuid::new_v4());
        while workflow.step(&id).is_some() {
            id = format!("step-{}", uuid::Uuid::new_v4());
        }

        let step = Step {
            id,
            kind: draft.kind,
            title: draft.title,
            description: draft.description,
            config: draft.config,
            order: workflow.steps.len() as u32 + 1,
        };
        workflow.steps.push(step.clone());
        workflow.updated_at = Utc::now();
        tracing::debug!(workflow = %workflow_id, step = %step.id, kind = %step.kind, "Step added");
        Ok(step)
    }

    pub fn update_step(
        &mut self,
        workflow_id: &str,
        step_id: &str,
        patch: StepPatch,
    ) -> Result<(), StoreError> {
        let workflow = self.workflow_mut(workflow_id)?;
        let step = workflow
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| not_found_step(workflow_id, step_id))?;

        if let Some(title) = patch.title {
            step.title = title;
        }
        if let Some(description) = patch.description {
            step.description = description;
        }
        if let Some(config) = patch.config {
            step.config = config;
        }
        workflow.updated_at = Utc::now();
        Ok(())
    }

    pub fn delete_step(&mut self, workflow_id: &str, step_id: &str) -> Result<Step, StoreError> {
        let workflow = self.workflow_mut(workflow_id)?;
        let idx = workflow
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| not_found_step(workflow_id, step_id))?;

        let removed = workflow.steps.remove(idx);
        renumber(&mut workflow.steps);
        workflow.updated_at = Utc::now();
        Ok(removed)
    }

    /// Move the step at array position `from` to position `to` (0-based).
    pub fn reorder_steps(
        &mut self,
        workflow_id: &str,
        from: usize,
        to: usize,
    ) -> Result<(), StoreError> {
        let workflow = self.workflow_mut(workflow_id)?;
        let len = workflow.steps.len();
        if from >= len || to >= len {
            return Err(StoreError::Validation(format!(
                "cannot move step {} to {}: workflow has {} steps",
                from, to, len
            )));
        }
        if from == to {
            return Ok(());
        }

        let step = workflow.steps.remove(from);
        workflow.steps.insert(to, step);
        renumber(&mut workflow.steps);
        workflow.updated_at = Utc::now();
        Ok(())
    }

    /// Instantiate a template and add the copy to the store.
    pub fn import_template(&mut self, template: &Workflow) -> Workflow {
        let workflow = self.importer.instantiate(template);
        tracing::info!(
            workflow = %workflow.id,
            template = %template.id,
            steps = workflow.steps.len(),
            "Template imported"
        );
        self.workflows.push(workflow.clone());
        workflow
    }

    // -- persistence --------------------------------------------------------

    /// Load a store snapshot. A missing file yields an empty store.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;

        let mut store = Self {
            workflows: snapshot.workflows,
            current: None,
            importer: TemplateImporter::default(),
        };
        for workflow in &mut store.workflows {
            renumber(&mut workflow.steps);
        }
        if let Some(id) = snapshot.current_workflow_id {
            store.load_workflow(&id);
        }
        Ok(store)
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let snapshot = StoreSnapshot {
            workflows: self.workflows.clone(),
            current_workflow_id: self.current.clone(),
        };

        // Atomic write: write to temp file then rename
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(&tmp_path, &content).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        Ok(())
    }

    fn workflow_mut(&mut self, id: &str) -> Result<&mut Workflow, StoreError> {
        self.workflows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| not_found_workflow(id))
    }

    fn fresh_workflow_id(&self) -> String {
        loop {
            let id = format!("workflow-{}", uuid::Uuid::new_v4());
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}

fn not_found_workflow(id: &str) -> StoreError {
    tracing::debug!(workflow = %id, "Unknown workflow id, ignoring");
    StoreError::WorkflowNotFound(id.to_string())
}

fn not_found_step(workflow: &str, step: &str) -> StoreError {
    tracing::debug!(workflow = %workflow, step = %step, "Unknown step id, ignoring");
    StoreError::StepNotFound {
        workflow: workflow.to_string(),
        step: step.to_string(),
    }
}

/// Rewrite `order` so it matches array position, starting at 1.
fn renumber(steps: &mut [Step]) {
    for (i, step) in steps.iter_mut().enumerate() {
        step.order = i as u32 + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StepConfig, StepType};
    use std::collections::HashSet;

    fn orders(w: &Workflow) -> Vec<u32> {
        w.steps.iter().map(|s| s.order).collect()
    }

    fn store_with_steps(n: usize) -> (WorkflowStore, String) {
        let mut store = WorkflowStore::new();
        let wf = store.create_workflow("wf", "");
        for i in 0..n {
            store
                .add_step(
                    &wf.id,
                    StepDraft::new(StepType::Wait).with_config(StepConfig::wait(i as f64)),
                )
                .unwrap();
        }
        (store, wf.id)
    }

    #[test]
    fn test_create_workflow() {
        let mut store = WorkflowStore::new();
        let a = store.create_workflow("Login", "signs in");
        let b = store.create_workflow("Login", "signs in");
        assert_ne!(a.id, b.id);
        assert!(a.steps.is_empty());
        assert_eq!(a.created_at, a.updated_at);
        assert_eq!(store.workflows().len(), 2);
    }

    #[test]
    fn test_add_step_assigns_next_order_and_defaults() {
        let (mut store, id) = store_with_steps(3);
        let step = store.add_step(&id, StepDraft::new(StepType::Navigate)).unwrap();
        assert_eq!(step.order, 4);
        assert_eq!(step.title, "Navigate to URL");
        assert_eq!(step.description, "Navigate to a specific URL");

        let wf = store.get(&id).unwrap();
        let ids: HashSet<_> = wf.steps.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_add_step_keeps_custom_title() {
        let (mut store, id) = store_with_steps(1);
        let step = store
            .add_step(
                &id,
                StepDraft::new(StepType::Click)
                    .with_title("Accept Cookies")
                    .with_config(StepConfig::click("//button[@id='accept']")),
            )
            .unwrap();
        assert_eq!(step.title, "Accept Cookies");
        assert_eq!(step.description, "Click on an element using XPath");
        assert_eq!(store.get(&id).unwrap().step_at(2).unwrap().title, "Accept Cookies");
    }

    #[test]
    fn test_reorder_scenario() {
        let mut store = WorkflowStore::new();
        let wf = store.create_workflow("wf", "");
        let drafts = [
            StepDraft::new(StepType::Navigate).with_config(StepConfig::navigate("https://a.test")),
            StepDraft::new(StepType::Click).with_config(StepConfig::click("//x")),
            StepDraft::new(StepType::Type).with_config(StepConfig::type_text("//x", "hi")),
        ];
        for d in drafts {
            store.add_step(&wf.id, d).unwrap();
        }

        store.reorder_steps(&wf.id, 0, 2).unwrap();

        let wf = store.get(&wf.id).unwrap();
        let kinds: Vec<_> = wf.steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![StepType::Click, StepType::Type, StepType::Navigate]);
        assert_eq!(orders(wf), vec![1, 2, 3]);
    }

    #[test]
    fn test_reorder_all_pairs_keep_ids_and_dense_orders() {
        let n = 5;
        for from in 0..n {
            for to in 0..n {
                let (mut store, id) = store_with_steps(n);
                let before: HashSet<_> =
                    store.get(&id).unwrap().steps.iter().map(|s| s.id.clone()).collect();
                let moved = store.get(&id).unwrap().steps[from].id.clone();

                store.reorder_steps(&id, from, to).unwrap();

                let wf = store.get(&id).unwrap();
                let after: HashSet<_> = wf.steps.iter().map(|s| s.id.clone()).collect();
                assert_eq!(before, after);
                assert_eq!(orders(wf), (1..=n as u32).collect::<Vec<_>>());
                assert_eq!(wf.steps[to].id, moved);
            }
        }
    }

    #[test]
    fn test_reorder_out_of_range_is_rejected_without_mutation() {
        let (mut store, id) = store_with_steps(3);
        let before = store.get(&id).unwrap().clone();

        let err = store.reorder_steps(&id, 0, 3).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.reorder_steps(&id, 7, 0).is_err());

        assert_eq!(store.get(&id).unwrap(), &before);
    }

    #[test]
    fn test_delete_step_keeps_orders_dense() {
        for pos in 0..4 {
            let (mut store, id) = store_with_steps(4);
            let victim = store.get(&id).unwrap().steps[pos].id.clone();
            store.delete_step(&id, &victim).unwrap();

            let wf = store.get(&id).unwrap();
            assert_eq!(orders(wf), vec![1, 2, 3]);
            assert!(wf.step(&victim).is_none());
        }
    }

    #[test]
    fn test_unknown_ids_leave_state_untouched() {
        let (mut store, id) = store_with_steps(2);
        let before = store.get(&id).unwrap().clone();

        let err = store.delete_step(&id, "nope").unwrap_err();
        assert!(err.is_not_found());
        assert!(store
            .update_step(&id, "nope", StepPatch::default())
            .unwrap_err()
            .is_not_found());
        assert!(store
            .update_workflow("missing", WorkflowPatch::default())
            .unwrap_err()
            .is_not_found());
        assert!(store
            .add_step("missing", StepDraft::new(StepType::Click))
            .is_err());

        assert_eq!(store.get(&id).unwrap(), &before);
    }

    #[test]
    fn test_update_step_merges_fields() {
        let (mut store, id) = store_with_steps(1);
        let step_id = store.get(&id).unwrap().steps[0].id.clone();
        let before_updated = store.get(&id).unwrap().updated_at;

        store
            .update_step(
                &id,
                &step_id,
                StepPatch {
                    title: Some("Pause".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let wf = store.get(&id).unwrap();
        assert_eq!(wf.steps[0].title, "Pause");
        assert_eq!(wf.steps[0].description, "Wait for a specified duration");
        assert_eq!(wf.steps[0].config.duration, Some(0.0));
        assert!(wf.updated_at >= before_updated);
    }

    #[test]
    fn test_update_workflow_patch() {
        let mut store = WorkflowStore::new();
        let wf = store.create_workflow("old", "desc");
        store
            .update_workflow(
                &wf.id,
                WorkflowPatch {
                    name: Some("new".into()),
                    description: None,
                },
            )
            .unwrap();
        let wf = store.get(&wf.id).unwrap();
        assert_eq!(wf.name, "new");
        assert_eq!(wf.description, "desc");
    }

    #[test]
    fn test_load_and_delete_current_workflow() {
        let mut store = WorkflowStore::new();
        let wf = store.create_workflow("wf", "");
        assert!(store.load_workflow("missing").is_none());
        assert!(store.current_workflow().is_none());

        assert_eq!(store.load_workflow(&wf.id).unwrap().id, wf.id);
        assert_eq!(store.current_id(), Some(wf.id.as_str()));

        store.delete_workflow(&wf.id).unwrap();
        assert!(store.current_workflow().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("workflows.json");

        let (mut store, id) = store_with_steps(3);
        store.load_workflow(&id);
        store.save(&path).await.unwrap();

        let loaded = WorkflowStore::load(&path).await.unwrap();
        assert_eq!(loaded.workflows(), store.workflows());
        assert_eq!(loaded.current_id(), Some(id.as_str()));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = WorkflowStore::load(&tmp.path().join("none.json"))
            .await
            .unwrap();
        assert!(store.workflows().is_empty());
    }
}
