//! Engine runtime: wires the workers together and exposes a cloneable
//! handle for callers outside the actor system.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use tracing::info;

use transport::HttpClient;

use crate::config::EngineConfig;
use crate::coordinator::Coordinator;
use crate::decider::Decider;
use crate::events::{ReporterMessage, WorkflowCommand};
use crate::executor::TaskExecutor;
use crate::instance::{InstanceSummary, WorkflowInstance};
use crate::mailbox::{mailbox, Address};
use crate::models::ContextualInput;
use crate::repository::{ContextualInputStore, WorkflowRegistry};
use crate::reporter::Reporter;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Lifecycle operation requested from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Schedule,
    Start,
    Stop,
    Cancel,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schedule => write!(f, "schedule"),
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// An inbound operation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub workflow_name: String,
    #[serde(default)]
    pub instance_name: Option<String>,
    pub operation: OperationKind,
    /// Published as global inputs of `workflow_name` before the command is
    /// sent.
    #[serde(default)]
    pub inputs: Vec<ContextualInput>,
}

impl Operation {
    pub fn new(workflow_name: impl Into<String>, operation: OperationKind) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            instance_name: None,
            operation,
            inputs: Vec::new(),
        }
    }

    pub fn instance(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = Some(instance_name.into());
        self
    }

    pub fn input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.push(ContextualInput::new(key, value));
        self
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Handle to a running engine.
///
/// Cloning is cheap; every clone talks to the same workers.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<WorkflowRegistry>,
    inputs: Arc<ContextualInputStore>,
    coordinator: Address<WorkflowCommand>,
    reporter: Address<ReporterMessage>,
    summaries: broadcast::Sender<InstanceSummary>,
}

impl Engine {
    /// Spawn the coordinator, decider, reporter and task executor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: EngineConfig,
        registry: Arc<WorkflowRegistry>,
        inputs: Arc<ContextualInputStore>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        let (coordinator, coordinator_rx) = mailbox("coordinator");
        let (decider, decider_rx) = mailbox("decider");
        let (reporter, reporter_rx) = mailbox("reporter");
        let (executor, executor_rx) = mailbox("executor");
        let (summaries, _) = broadcast::channel(config.summary_capacity.max(1));

        tokio::spawn(
            Coordinator::new(registry.clone(), decider.clone(), reporter.clone()).run(coordinator_rx),
        );
        tokio::spawn(Decider::new(registry.clone(), coordinator.clone(), executor).run(decider_rx));
        tokio::spawn(
            Reporter::new(registry.clone(), inputs.clone(), coordinator.clone(), summaries.clone())
                .run(reporter_rx),
        );
        tokio::spawn(
            TaskExecutor::new(registry.clone(), inputs.clone(), client, decider, reporter.clone())
                .run(executor_rx),
        );

        info!(summary_capacity = config.summary_capacity, "engine started");
        Self {
            registry,
            inputs,
            coordinator,
            reporter,
            summaries,
        }
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        &self.registry
    }

    pub fn inputs(&self) -> &Arc<ContextualInputStore> {
        &self.inputs
    }

    /// Publish the operation's inputs, then hand it to the coordinator.
    ///
    /// # Errors
    /// `MissingInstanceName` when START, STOP or CANCEL names no instance.
    pub fn submit(&self, operation: Operation) -> Result<(), EngineError> {
        let Operation {
            workflow_name,
            instance_name,
            operation: kind,
            inputs,
        } = operation;

        let command = match (kind, instance_name) {
            (OperationKind::Schedule, _) => WorkflowCommand::Schedule {
                workflow_name: workflow_name.clone(),
            },
            (_, None) => return Err(EngineError::MissingInstanceName(kind)),
            (OperationKind::Start, Some(instance_name)) => WorkflowCommand::Start {
                workflow_name: workflow_name.clone(),
                instance_name,
            },
            (OperationKind::Stop, Some(instance_name)) => WorkflowCommand::Stop {
                workflow_name: workflow_name.clone(),
                instance_name,
            },
            (OperationKind::Cancel, Some(instance_name)) => WorkflowCommand::Cancel {
                workflow_name: workflow_name.clone(),
                instance_name,
            },
        };

        if !inputs.is_empty() {
            self.inputs.save_global_inputs(&workflow_name, inputs);
        }
        info!(workflow = %workflow_name, operation = %kind, "operation submitted");
        self.coordinator.tell(command);
        Ok(())
    }

    pub fn schedule(&self, workflow_name: impl Into<String>) {
        self.coordinator.tell(WorkflowCommand::Schedule {
            workflow_name: workflow_name.into(),
        });
    }

    pub fn start_instance(&self, workflow_name: impl Into<String>, instance_name: impl Into<String>) {
        self.coordinator.tell(WorkflowCommand::Start {
            workflow_name: workflow_name.into(),
            instance_name: instance_name.into(),
        });
    }

    pub fn stop(&self, workflow_name: impl Into<String>, instance_name: impl Into<String>) {
        self.coordinator.tell(WorkflowCommand::Stop {
            workflow_name: workflow_name.into(),
            instance_name: instance_name.into(),
        });
    }

    pub fn cancel(&self, workflow_name: impl Into<String>, instance_name: impl Into<String>) {
        self.coordinator.tell(WorkflowCommand::Cancel {
            workflow_name: workflow_name.into(),
            instance_name: instance_name.into(),
        });
    }

    /// Force an instance into FAILED.
    pub fn fail(&self, workflow_name: impl Into<String>, instance_name: impl Into<String>) {
        self.coordinator.tell(WorkflowCommand::Fail {
            workflow_name: workflow_name.into(),
            instance_name: instance_name.into(),
        });
    }

    /// Snapshot of a tracked instance; `None` once evicted or never seen.
    pub async fn instance(&self, instance_name: impl Into<String>) -> Option<WorkflowInstance> {
        let (reply, rx) = oneshot::channel();
        self.reporter.tell(ReporterMessage::Inspect {
            instance_name: instance_name.into(),
            reply,
        });
        rx.await.ok().flatten()
    }

    /// Snapshots of every tracked instance, sorted by instance name.
    pub async fn instances(&self) -> Vec<WorkflowInstance> {
        let (reply, rx) = oneshot::channel();
        self.reporter.tell(ReporterMessage::List { reply });
        rx.await.unwrap_or_default()
    }

    /// Receive an [`InstanceSummary`] for every instance evicted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<InstanceSummary> {
        self.summaries.subscribe()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}
