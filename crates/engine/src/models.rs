//! Core definition models for the orchestration engine.
//!
//! These types are the source of truth for what a workflow looks like
//! in memory. They are (de)serialised as camelCase JSON, which is also the
//! format accepted by the API and the CLI.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use transport::HttpMethod;

// ---------------------------------------------------------------------------
// HttpRequest
// ---------------------------------------------------------------------------

/// A request header. `value` may be a literal or a contextual input key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// A query parameter. `value` may be a literal or a contextual input key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// The HTTP call template of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// URL with optional `{...}` placeholders filled from `uri_variables`.
    pub url: String,
    #[serde(default)]
    pub uri_variables: Vec<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            uri_variables: Vec::new(),
            headers: Vec::new(),
            params: Vec::new(),
            body: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A named HTTP call belonging to a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,
    /// Stamped by [`Workflow::upsert_task`]; may be omitted in JSON.
    #[serde(default)]
    pub workflow_name: String,
    pub http_request: HttpRequest,
}

impl Task {
    pub fn new(name: impl Into<String>, http_request: HttpRequest) -> Self {
        Self {
            name: name.into(),
            workflow_name: String::new(),
            http_request,
        }
    }

    /// Contextual input key under which this task publishes its response.
    pub fn response_key(&self) -> String {
        response_key(&self.name)
    }
}

/// `${<task>.response}`
pub fn response_key(task_name: &str) -> String {
    format!("${{{task_name}.response}}")
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Lifecycle event types a handler can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Task events
    TaskStarted,
    TaskCompleted,
    #[serde(rename = "TASK_TIMEDOUT")]
    TaskTimedOut,
    TaskFailed,
    // Workflow events
    WorkflowScheduled,
    WorkflowStarted,
    WorkflowCompleted,
    WorkflowStopped,
    WorkflowFailed,
    WorkflowCanceled,
}

/// Event fields a condition may be bound to.
///
/// Absent fields leave the matching condition unbound, which evaluates to
/// `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Binding<'a> {
    pub workflow_name: Option<&'a str>,
    pub task_name: Option<&'a str>,
    pub response: Option<&'a str>,
}

/// A predicate over the triggering event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Condition {
    WorkflowNameEquals { workflow_name: String },
    TaskNameEquals { task_name: String },
    /// `pattern` is a regular expression searched for in the task response.
    TaskResponseMatches { pattern: String },
}

impl Condition {
    pub fn evaluate(&self, binding: &Binding<'_>) -> bool {
        match self {
            Self::WorkflowNameEquals { workflow_name } => {
                binding.workflow_name == Some(workflow_name.as_str())
            }
            Self::TaskNameEquals { task_name } => binding.task_name == Some(task_name.as_str()),
            Self::TaskResponseMatches { pattern } => {
                let Some(response) = binding.response else {
                    return false;
                };
                match Regex::new(pattern) {
                    Ok(re) => re.is_match(response),
                    Err(err) => {
                        warn!(%pattern, error = %err, "invalid response pattern, condition is false");
                        false
                    }
                }
            }
        }
    }
}

/// Operation carried by a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandOperation {
    StartTask,
    ScheduleWorkflow,
    StartWorkflow,
    StopWorkflow,
    CancelWorkflow,
}

/// An action dispatched by the decider when a handler fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub operation: CommandOperation,
    #[serde(default)]
    pub task_name: Option<String>,
    /// Overwritten with the triggering event's workflow before dispatch.
    #[serde(default)]
    pub workflow_name: Option<String>,
}

impl Command {
    pub fn start_task(task_name: impl Into<String>) -> Self {
        Self {
            operation: CommandOperation::StartTask,
            task_name: Some(task_name.into()),
            workflow_name: None,
        }
    }

    pub fn workflow(operation: CommandOperation) -> Self {
        Self {
            operation,
            task_name: None,
            workflow_name: None,
        }
    }
}

/// An event-type-scoped rule: conditions + commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
    pub name: String,
    pub event_type: EventType,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl Handler {
    pub fn new(name: impl Into<String>, event_type: EventType) -> Self {
        Self {
            name: name.into(),
            event_type,
            conditions: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn then(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Logical AND of every condition; an empty list is `true`.
    pub fn matches(&self, binding: &Binding<'_>) -> bool {
        self.conditions
            .iter()
            .fold(true, |acc, condition| acc & condition.evaluate(binding))
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub handlers: Vec<Handler>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Builder-style [`Workflow::upsert_task`].
    pub fn with_task(mut self, task: Task) -> Self {
        self.upsert_task(task);
        self
    }

    /// Builder-style [`Workflow::upsert_handler`].
    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.upsert_handler(handler);
        self
    }

    /// Stamp every task with this workflow's name.
    pub fn normalize(&mut self) {
        for task in &mut self.tasks {
            task.workflow_name = self.name.clone();
        }
    }

    pub fn find_task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    pub fn find_handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.iter().find(|h| h.name == name)
    }

    /// Insert or replace (in place) a task by name.
    pub fn upsert_task(&mut self, mut task: Task) -> &Task {
        task.workflow_name = self.name.clone();
        match self.tasks.iter().position(|t| t.name == task.name) {
            Some(idx) => {
                self.tasks[idx] = task;
                &self.tasks[idx]
            }
            None => {
                self.tasks.push(task);
                &self.tasks[self.tasks.len() - 1]
            }
        }
    }

    /// Insert or replace (in place) a handler by name.
    pub fn upsert_handler(&mut self, handler: Handler) -> &Handler {
        match self.handlers.iter().position(|h| h.name == handler.name) {
            Some(idx) => {
                self.handlers[idx] = handler;
                &self.handlers[idx]
            }
            None => {
                self.handlers.push(handler);
                &self.handlers[self.handlers.len() - 1]
            }
        }
    }

    /// Returns `true` if a task was removed.
    pub fn remove_task(&mut self, name: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.name != name);
        self.tasks.len() != before
    }

    /// Returns `true` if a handler was removed.
    pub fn remove_handler(&mut self, name: &str) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|h| h.name != name);
        self.handlers.len() != before
    }

    /// Handlers reacting to `event_type`, in definition order.
    pub fn handlers_for(&self, event_type: EventType) -> impl Iterator<Item = &Handler> {
        self.handlers
            .iter()
            .filter(move |h| h.event_type == event_type)
    }
}

// ---------------------------------------------------------------------------
// ContextualInput
// ---------------------------------------------------------------------------

/// A named placeholder value substituted into request templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextualInput {
    pub key: String,
    pub value: String,
}

impl ContextualInput {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
