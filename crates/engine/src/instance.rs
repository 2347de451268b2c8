//! Runtime records kept by the reporter for in-flight instances.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::TaskReport;

/// Lifecycle status of a workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Scheduled,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// TaskInstance
// ---------------------------------------------------------------------------

/// One activation of a task within an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    pub workflow_name: String,
    pub workflow_instance_name: String,
    pub task_name: String,
    pub task_instance_name: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub response: Option<String>,
    pub failure: Option<String>,
}

impl TaskInstance {
    pub fn from_report(report: &TaskReport) -> Self {
        Self {
            workflow_name: report.workflow_name.clone(),
            workflow_instance_name: report.workflow_instance_name.clone(),
            task_name: report.task_name.clone(),
            task_instance_name: report.task_instance_name.clone(),
            start_time: None,
            end_time: None,
            response: None,
            failure: None,
        }
    }

    /// Both start and end time are set.
    pub fn is_terminated(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_some()
    }

    pub fn elapsed_ms(&self) -> Option<i64> {
        elapsed_ms(self.start_time, self.end_time)
    }
}

// ---------------------------------------------------------------------------
// WorkflowInstance
// ---------------------------------------------------------------------------

/// Aggregated state of one running workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInstance {
    pub workflow_name: String,
    pub instance_name: String,
    pub status: WorkflowStatus,
    /// Number of tasks in the definition when the instance was scheduled.
    pub count_tasks: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// task instance name → activation
    pub tasks: HashMap<String, TaskInstance>,
}

impl WorkflowInstance {
    pub fn scheduled(workflow_name: impl Into<String>, instance_name: impl Into<String>, count_tasks: usize) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            instance_name: instance_name.into(),
            status: WorkflowStatus::Scheduled,
            count_tasks,
            start_time: None,
            end_time: None,
            tasks: HashMap::new(),
        }
    }

    /// `count_tasks` terminated activations have been recorded.
    ///
    /// Counts activations, not distinct task names: a task activated twice
    /// contributes twice.
    pub fn is_terminated(&self) -> bool {
        self.count_tasks == self.tasks.values().filter(|t| t.is_terminated()).count()
    }

    pub fn elapsed_ms(&self) -> Option<i64> {
        elapsed_ms(self.start_time, self.end_time)
    }

    /// Snapshot published when the instance is evicted.
    pub fn summary(&self) -> InstanceSummary {
        let mut tasks: Vec<TaskSummary> = self
            .tasks
            .values()
            .map(|t| TaskSummary {
                task_name: t.task_name.clone(),
                task_instance_name: t.task_instance_name.clone(),
                elapsed_ms: t.elapsed_ms(),
                success: t.failure.is_none() && t.response.is_some(),
                response: t.response.clone(),
                failure: t.failure.clone(),
            })
            .collect();
        tasks.sort_by(|a, b| a.task_name.cmp(&b.task_name));

        InstanceSummary {
            workflow_name: self.workflow_name.clone(),
            instance_name: self.instance_name.clone(),
            status: self.status,
            elapsed_ms: self.elapsed_ms(),
            success: self.status == WorkflowStatus::Completed,
            tasks,
        }
    }
}

fn elapsed_ms(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<i64> {
    match (start, end) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds().abs()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub task_name: String,
    pub task_instance_name: String,
    pub elapsed_ms: Option<i64>,
    pub success: bool,
    pub response: Option<String>,
    pub failure: Option<String>,
}

/// Published on the summary channel when an instance is evicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSummary {
    pub workflow_name: String,
    pub instance_name: String,
    pub status: WorkflowStatus,
    pub elapsed_ms: Option<i64>,
    pub success: bool,
    pub tasks: Vec<TaskSummary>,
}
