//! Engine-level error types.

use thiserror::Error;

use crate::runtime::OperationKind;

/// Errors produced by the engine (validation, registry access, operations).
///
/// Nothing on the message path returns these: runtime failures are logged,
/// dropped, or recorded on the affected instance.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more tasks share the same name.
    #[error("duplicate task name: '{0}'")]
    DuplicateTaskName(String),

    /// Two or more handlers share the same name.
    #[error("duplicate handler name: '{0}'")]
    DuplicateHandlerName(String),

    /// A handler references a task the workflow does not define.
    #[error("handler '{handler}' references unknown task '{task}'")]
    UnknownTaskReference { handler: String, task: String },

    /// A START_TASK command without a task name.
    #[error("handler '{0}' has a START_TASK command without a task name")]
    MissingTaskName(String),

    // ------ Registry errors ------

    #[error("workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("task '{task}' not found in workflow '{workflow}'")]
    TaskNotFound { workflow: String, task: String },

    #[error("handler '{handler}' not found in workflow '{workflow}'")]
    HandlerNotFound { workflow: String, handler: String },

    // ------ Operation errors ------

    /// START, STOP and CANCEL need to know which instance they target.
    #[error("operation '{0}' requires an instance name")]
    MissingInstanceName(OperationKind),
}

impl EngineError {
    /// Whether this error describes an invalid definition or request
    /// (as opposed to a missing resource).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateTaskName(_)
                | Self::DuplicateHandlerName(_)
                | Self::UnknownTaskReference { .. }
                | Self::MissingTaskName(_)
                | Self::MissingInstanceName(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WorkflowNotFound(_) | Self::TaskNotFound { .. } | Self::HandlerNotFound { .. }
        )
    }
}
