//! Messages exchanged between workers.
//!
//! Each category is a sum type with an explicit kind; there is no message
//! hierarchy.

use tokio::sync::oneshot;

use crate::instance::WorkflowInstance;
use crate::models::{Binding, EventType};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Lifecycle commands understood by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    Schedule { workflow_name: String },
    Start { workflow_name: String, instance_name: String },
    Stop { workflow_name: String, instance_name: String },
    Cancel { workflow_name: String, instance_name: String },
    /// Sent by the reporter once every expected task has terminated.
    Complete { workflow_name: String, instance_name: String },
    Fail { workflow_name: String, instance_name: String },
}

/// Transitions understood by an instance worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceCommand {
    Create { workflow_name: String, instance_name: String },
    Start,
    Stop,
    Cancel,
    Completed,
    Failed,
}

/// Task activation request, handled by the task executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTask {
    pub task_name: String,
    pub workflow_name: String,
    pub workflow_instance_name: String,
}

// ---------------------------------------------------------------------------
// Workflow events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEventKind {
    Scheduled,
    Started,
    Stopped,
    Completed,
    Failed,
    Canceled,
}

impl WorkflowEventKind {
    pub fn event_type(self) -> EventType {
        match self {
            Self::Scheduled => EventType::WorkflowScheduled,
            Self::Started => EventType::WorkflowStarted,
            Self::Stopped => EventType::WorkflowStopped,
            Self::Completed => EventType::WorkflowCompleted,
            Self::Failed => EventType::WorkflowFailed,
            Self::Canceled => EventType::WorkflowCanceled,
        }
    }

    /// Events after which the reporter evicts the instance.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowEvent {
    pub kind: WorkflowEventKind,
    pub workflow_name: String,
    pub instance_name: String,
}

impl WorkflowEvent {
    pub fn new(kind: WorkflowEventKind, workflow_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Self {
            kind,
            workflow_name: workflow_name.into(),
            instance_name: instance_name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task events (decider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEventKind {
    Started,
    Completed,
    TimedOut,
    Failed,
}

impl TaskEventKind {
    pub fn event_type(self) -> EventType {
        match self {
            Self::Started => EventType::TaskStarted,
            Self::Completed => EventType::TaskCompleted,
            Self::TimedOut => EventType::TaskTimedOut,
            Self::Failed => EventType::TaskFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task_name: String,
    pub workflow_name: String,
    pub workflow_instance_name: String,
    /// Only set for `Completed`.
    pub response: Option<String>,
}

/// Everything the decider reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeciderEvent {
    Workflow(WorkflowEvent),
    Task(TaskEvent),
}

impl DeciderEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Workflow(e) => e.kind.event_type(),
            Self::Task(e) => e.kind.event_type(),
        }
    }

    pub fn workflow_name(&self) -> &str {
        match self {
            Self::Workflow(e) => &e.workflow_name,
            Self::Task(e) => &e.workflow_name,
        }
    }

    pub fn instance_name(&self) -> &str {
        match self {
            Self::Workflow(e) => &e.instance_name,
            Self::Task(e) => &e.workflow_instance_name,
        }
    }

    /// Fields conditions may bind to. Workflow events carry no task.
    pub fn binding(&self) -> Binding<'_> {
        match self {
            Self::Workflow(e) => Binding {
                workflow_name: Some(&e.workflow_name),
                task_name: None,
                response: None,
            },
            Self::Task(e) => Binding {
                workflow_name: Some(&e.workflow_name),
                task_name: Some(&e.task_name),
                response: e.response.as_deref(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Reporter events
// ---------------------------------------------------------------------------

/// Identity of one task activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task_name: String,
    pub task_instance_name: String,
    pub workflow_name: String,
    pub workflow_instance_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    Workflow(WorkflowEvent),
    TaskStarted(TaskReport),
    TaskCompleted { task: TaskReport, response: String },
    TaskTimedOut(TaskReport),
    TaskFailed { task: TaskReport, failure: String },
}

/// Reporter mailbox: events plus read-only queries answered in turn.
#[derive(Debug)]
pub enum ReporterMessage {
    Report(ReportEvent),
    Inspect {
        instance_name: String,
        reply: oneshot::Sender<Option<WorkflowInstance>>,
    },
    List {
        reply: oneshot::Sender<Vec<WorkflowInstance>>,
    },
}

impl From<ReportEvent> for ReporterMessage {
    fn from(event: ReportEvent) -> Self {
        Self::Report(event)
    }
}
