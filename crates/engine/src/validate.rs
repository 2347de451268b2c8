//! Definition validation: run this before registering a workflow.
//!
//! Rules enforced:
//! 1. Task names must be unique within the workflow.
//! 2. Handler names must be unique within the workflow.
//! 3. Every START_TASK command must name a task, and that task must exist.
//! 4. Every TASK_NAME_EQUALS condition must reference an existing task.
//!
//! The engine never re-validates at runtime: a registered definition is
//! executed as is.

use std::collections::HashSet;

use crate::models::{CommandOperation, Condition, Workflow};
use crate::EngineError;

/// Validate the workflow's task and handler references.
///
/// # Errors
/// - [`EngineError::DuplicateTaskName`] if two tasks share a name.
/// - [`EngineError::DuplicateHandlerName`] if two handlers share a name.
/// - [`EngineError::MissingTaskName`] for a START_TASK without a target.
/// - [`EngineError::UnknownTaskReference`] if a handler names a missing task.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), EngineError> {
    // -----------------------------------------------------------------------
    // 1. Task names are unique
    // -----------------------------------------------------------------------
    let mut task_names: HashSet<&str> = HashSet::new();
    for task in &workflow.tasks {
        if !task_names.insert(task.name.as_str()) {
            return Err(EngineError::DuplicateTaskName(task.name.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Handler names are unique
    // -----------------------------------------------------------------------
    let mut handler_names: HashSet<&str> = HashSet::new();
    for handler in &workflow.handlers {
        if !handler_names.insert(handler.name.as_str()) {
            return Err(EngineError::DuplicateHandlerName(handler.name.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 3 + 4. Task references resolve
    // -----------------------------------------------------------------------
    for handler in &workflow.handlers {
        for command in &handler.commands {
            if command.operation != CommandOperation::StartTask {
                continue;
            }
            let task = command
                .task_name
                .as_deref()
                .ok_or_else(|| EngineError::MissingTaskName(handler.name.clone()))?;
            if !task_names.contains(task) {
                return Err(EngineError::UnknownTaskReference {
                    handler: handler.name.clone(),
                    task: task.to_owned(),
                });
            }
        }

        for condition in &handler.conditions {
            if let Condition::TaskNameEquals { task_name } = condition {
                if !task_names.contains(task_name.as_str()) {
                    return Err(EngineError::UnknownTaskReference {
                        handler: handler.name.clone(),
                        task: task_name.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}
