//! Instance worker: owns the lifecycle state machine of one instance.
//!
//! ```text
//! Create → SCHEDULED ─Start→ RUNNING ─Stop→ PAUSED ─Start→ RUNNING
//!          SCHEDULED ─Stop→ PAUSED
//!                      any non-terminal ─Cancel→ CANCELLED
//!                                       ─Completed→ COMPLETED
//!                                       ─Failed→ FAILED
//! ```
//!
//! The worker never sees task activity, so an instance whose tasks are
//! already running may still be SCHEDULED here; Stop is accepted from it.
//!
//! Every accepted transition emits exactly one decider event and one
//! reporter event. Commands before `Create`, after a terminal status, and
//! Start on RUNNING or Stop on PAUSED are ignored.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::events::{DeciderEvent, InstanceCommand, ReportEvent, ReporterMessage, WorkflowEvent, WorkflowEventKind};
use crate::instance::WorkflowStatus;
use crate::mailbox::Address;

pub struct InstanceWorker {
    workflow_name: String,
    instance_name: String,
    status: Option<WorkflowStatus>,
    decider: Address<DeciderEvent>,
    reporter: Address<ReporterMessage>,
}

impl InstanceWorker {
    pub fn new(
        instance_name: impl Into<String>,
        decider: Address<DeciderEvent>,
        reporter: Address<ReporterMessage>,
    ) -> Self {
        Self {
            workflow_name: String::new(),
            instance_name: instance_name.into(),
            status: None,
            decider,
            reporter,
        }
    }

    /// Current status; `None` before `Create`.
    pub fn status(&self) -> Option<WorkflowStatus> {
        self.status
    }

    /// Process messages until the instance reaches a terminal status or the
    /// coordinator goes away.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<InstanceCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
            if self.status.is_some_and(WorkflowStatus::is_terminal) {
                break;
            }
        }
        debug!(instance = %self.instance_name, "instance worker stopped");
    }

    pub fn handle(&mut self, cmd: InstanceCommand) {
        debug!(instance = %self.instance_name, ?cmd, status = ?self.status, "instance command");

        let (status, kind) = match cmd {
            InstanceCommand::Create { workflow_name, instance_name } => {
                if self.status.is_some() {
                    debug!(instance = %self.instance_name, "instance already created, ignoring create");
                    return;
                }
                self.workflow_name = workflow_name;
                self.instance_name = instance_name;
                (WorkflowStatus::Scheduled, WorkflowEventKind::Scheduled)
            }
            InstanceCommand::Start => (WorkflowStatus::Running, WorkflowEventKind::Started),
            InstanceCommand::Stop => (WorkflowStatus::Paused, WorkflowEventKind::Stopped),
            InstanceCommand::Cancel => (WorkflowStatus::Cancelled, WorkflowEventKind::Canceled),
            InstanceCommand::Completed => (WorkflowStatus::Completed, WorkflowEventKind::Completed),
            InstanceCommand::Failed => (WorkflowStatus::Failed, WorkflowEventKind::Failed),
        };

        if kind != WorkflowEventKind::Scheduled {
            match self.status {
                None => {
                    debug!(instance = %self.instance_name, "instance not created yet, ignoring command");
                    return;
                }
                Some(current) if current.is_terminal() => {
                    debug!(instance = %self.instance_name, %current, "instance already terminal, ignoring command");
                    return;
                }
                Some(current) if current == status => {
                    debug!(instance = %self.instance_name, %current, "instance already in target status, ignoring command");
                    return;
                }
                Some(_) => {}
            }
        }

        self.transition(status, kind);
    }

    fn transition(&mut self, status: WorkflowStatus, kind: WorkflowEventKind) {
        self.status = Some(status);
        info!(
            workflow = %self.workflow_name,
            instance = %self.instance_name,
            %status,
            "instance transition"
        );

        let event = WorkflowEvent::new(kind, self.workflow_name.clone(), self.instance_name.clone());
        self.decider.tell(DeciderEvent::Workflow(event.clone()));
        self.reporter.tell(ReportEvent::Workflow(event).into());
    }
}
