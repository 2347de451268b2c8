//! Decider: evaluates handlers against lifecycle events and dispatches
//! their commands.
//!
//! The decider keeps no state of its own. For each event it looks up the
//! handlers registered for `(workflow, event type)`, binds the event's
//! fields into their conditions and, when every condition holds, sends each
//! command in list order. Handlers are evaluated independently; one firing
//! never prevents another.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{DeciderEvent, StartTask, WorkflowCommand};
use crate::mailbox::Address;
use crate::models::{Command, CommandOperation};
use crate::repository::WorkflowRegistry;

pub struct Decider {
    registry: Arc<WorkflowRegistry>,
    coordinator: Address<WorkflowCommand>,
    executor: Address<StartTask>,
}

impl Decider {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        coordinator: Address<WorkflowCommand>,
        executor: Address<StartTask>,
    ) -> Self {
        Self {
            registry,
            coordinator,
            executor,
        }
    }

    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<DeciderEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(&event);
        }
        debug!("decider stopped");
    }

    /// Returns the number of handlers that fired.
    pub fn handle(&self, event: &DeciderEvent) -> usize {
        let event_type = event.event_type();
        debug!(
            workflow = event.workflow_name(),
            instance = event.instance_name(),
            ?event_type,
            "decider event"
        );

        let binding = event.binding();
        let mut fired = 0;
        for handler in self.registry.handlers_for(event.workflow_name(), event_type) {
            if !handler.matches(&binding) {
                continue;
            }
            info!(
                workflow = event.workflow_name(),
                instance = event.instance_name(),
                handler = %handler.name,
                ?event_type,
                "handler fired"
            );
            for command in &handler.commands {
                self.dispatch(command, event);
            }
            fired += 1;
        }
        fired
    }

    fn dispatch(&self, command: &Command, event: &DeciderEvent) {
        // Commands always act on the workflow that raised the event.
        let workflow_name = event.workflow_name().to_owned();
        let instance_name = event.instance_name().to_owned();

        match command.operation {
            CommandOperation::StartTask => match &command.task_name {
                Some(task_name) => self.executor.tell(StartTask {
                    task_name: task_name.clone(),
                    workflow_name,
                    workflow_instance_name: instance_name,
                }),
                None => warn!(workflow = %workflow_name, "START_TASK without task name ignored"),
            },
            CommandOperation::ScheduleWorkflow => {
                self.coordinator.tell(WorkflowCommand::Schedule { workflow_name })
            }
            CommandOperation::StartWorkflow => self.coordinator.tell(WorkflowCommand::Start {
                workflow_name,
                instance_name,
            }),
            CommandOperation::StopWorkflow => self.coordinator.tell(WorkflowCommand::Stop {
                workflow_name,
                instance_name,
            }),
            CommandOperation::CancelWorkflow => self.coordinator.tell(WorkflowCommand::Cancel {
                workflow_name,
                instance_name,
            }),
        }
    }
}
