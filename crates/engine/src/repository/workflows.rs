//! Definition registry: workflow name → `Workflow`.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::models::{EventType, Handler, Task, Workflow};
use crate::repository::ContextualInputStore;
use crate::EngineError;

/// In-memory workflow catalog.
///
/// Reads return owned snapshots so no lock is held across a message handler.
pub struct WorkflowRegistry {
    workflows: DashMap<String, Workflow>,
    inputs: Arc<ContextualInputStore>,
}

impl WorkflowRegistry {
    /// Deleting a workflow also drops its global inputs from `inputs`.
    pub fn new(inputs: Arc<ContextualInputStore>) -> Self {
        Self {
            workflows: DashMap::new(),
            inputs,
        }
    }

    // ------------------------------------------------------------------
    // Workflows
    // ------------------------------------------------------------------

    /// Insert or replace a workflow by name.
    pub fn save(&self, mut workflow: Workflow) -> Workflow {
        workflow.normalize();
        debug!(workflow = %workflow.name, "saving workflow definition");
        self.workflows.insert(workflow.name.clone(), workflow.clone());
        workflow
    }

    pub fn save_all(&self, workflows: impl IntoIterator<Item = Workflow>) {
        for workflow in workflows {
            self.save(workflow);
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<Workflow> {
        self.workflows.get(name).map(|w| w.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workflows.contains_key(name)
    }

    /// All workflows, sorted by name.
    pub fn find_all(&self) -> Vec<Workflow> {
        let mut all: Vec<Workflow> = self.workflows.iter().map(|w| w.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Remove a workflow and its global contextual inputs.
    pub fn delete(&self, name: &str) -> Result<(), EngineError> {
        if self.workflows.remove(name).is_none() {
            return Err(EngineError::WorkflowNotFound(name.to_owned()));
        }
        self.inputs.delete_global(name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    pub fn save_task(&self, workflow: &str, task: Task) -> Result<Task, EngineError> {
        let mut entry = self
            .workflows
            .get_mut(workflow)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))?;
        Ok(entry.upsert_task(task).clone())
    }

    pub fn find_task(&self, workflow: &str, task: &str) -> Result<Task, EngineError> {
        let entry = self
            .workflows
            .get(workflow)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))?;
        entry
            .find_task(task)
            .cloned()
            .ok_or_else(|| EngineError::TaskNotFound {
                workflow: workflow.to_owned(),
                task: task.to_owned(),
            })
    }

    pub fn find_tasks(&self, workflow: &str) -> Result<Vec<Task>, EngineError> {
        self.workflows
            .get(workflow)
            .map(|w| w.tasks.clone())
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))
    }

    pub fn delete_task(&self, workflow: &str, task: &str) -> Result<(), EngineError> {
        let mut entry = self
            .workflows
            .get_mut(workflow)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))?;
        if !entry.remove_task(task) {
            return Err(EngineError::TaskNotFound {
                workflow: workflow.to_owned(),
                task: task.to_owned(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    pub fn save_handler(&self, workflow: &str, handler: Handler) -> Result<Handler, EngineError> {
        let mut entry = self
            .workflows
            .get_mut(workflow)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))?;
        Ok(entry.upsert_handler(handler).clone())
    }

    pub fn find_handler(&self, workflow: &str, handler: &str) -> Result<Handler, EngineError> {
        let entry = self
            .workflows
            .get(workflow)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))?;
        entry
            .find_handler(handler)
            .cloned()
            .ok_or_else(|| EngineError::HandlerNotFound {
                workflow: workflow.to_owned(),
                handler: handler.to_owned(),
            })
    }

    pub fn find_handlers(&self, workflow: &str) -> Result<Vec<Handler>, EngineError> {
        self.workflows
            .get(workflow)
            .map(|w| w.handlers.clone())
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))
    }

    pub fn delete_handler(&self, workflow: &str, handler: &str) -> Result<(), EngineError> {
        let mut entry = self
            .workflows
            .get_mut(workflow)
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow.to_owned()))?;
        if !entry.remove_handler(handler) {
            return Err(EngineError::HandlerNotFound {
                workflow: workflow.to_owned(),
                handler: handler.to_owned(),
            });
        }
        Ok(())
    }

    /// Handlers of `workflow` reacting to `event_type`, in definition order.
    /// Empty when the workflow is unknown.
    pub fn handlers_for(&self, workflow: &str, event_type: EventType) -> Vec<Handler> {
        self.workflows
            .get(workflow)
            .map(|w| w.handlers_for(event_type).cloned().collect())
            .unwrap_or_default()
    }
}
