//! Workflow coordinator: routes lifecycle commands to instance workers,
//! creating one per scheduled instance.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::events::{DeciderEvent, InstanceCommand, ReporterMessage, WorkflowCommand};
use crate::mailbox::{mailbox, Address};
use crate::repository::WorkflowRegistry;
use crate::worker::InstanceWorker;

/// `<workflow>-<n>`
pub fn instance_name(workflow_name: &str, counter: u64) -> String {
    format!("{workflow_name}-{counter}")
}

pub struct Coordinator {
    registry: Arc<WorkflowRegistry>,
    /// workflow name → last issued counter
    counters: HashMap<String, u64>,
    /// instance name → live worker
    workers: HashMap<String, Address<InstanceCommand>>,
    /// every instance name ever given a worker; none is created twice
    created: HashSet<String>,
    decider: Address<DeciderEvent>,
    reporter: Address<ReporterMessage>,
}

impl Coordinator {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        decider: Address<DeciderEvent>,
        reporter: Address<ReporterMessage>,
    ) -> Self {
        Self {
            registry,
            counters: HashMap::new(),
            workers: HashMap::new(),
            created: HashSet::new(),
            decider,
            reporter,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkflowCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        debug!("coordinator stopped");
    }

    /// Must be called from within a tokio runtime: new instances spawn their
    /// worker task.
    pub fn handle(&mut self, cmd: WorkflowCommand) {
        debug!(?cmd, "coordinator command");
        self.workers.retain(|_, worker| !worker.is_closed());

        match cmd {
            WorkflowCommand::Schedule { workflow_name } => self.schedule(workflow_name),
            WorkflowCommand::Start { workflow_name, instance_name } => {
                match self.workers.get(&instance_name) {
                    Some(worker) => worker.tell(InstanceCommand::Start),
                    None if self.created.contains(&instance_name) => {
                        debug!(instance = %instance_name, "instance already finished, start dropped");
                    }
                    None if !self.registry.contains(&workflow_name) => {
                        warn!(workflow = %workflow_name, "start for unknown workflow dropped");
                    }
                    None => {
                        // Scheduling was skipped: create the instance instead.
                        let worker = self.spawn_worker(&instance_name);
                        worker.tell(InstanceCommand::Create {
                            workflow_name,
                            instance_name,
                        });
                    }
                }
            }
            WorkflowCommand::Stop { instance_name, .. } => self.forward(&instance_name, InstanceCommand::Stop),
            WorkflowCommand::Cancel { instance_name, .. } => {
                self.forward(&instance_name, InstanceCommand::Cancel)
            }
            WorkflowCommand::Complete { instance_name, .. } => {
                self.forward(&instance_name, InstanceCommand::Completed)
            }
            WorkflowCommand::Fail { instance_name, .. } => self.forward(&instance_name, InstanceCommand::Failed),
        }
    }

    /// Number of workers still alive.
    pub fn live_workers(&self) -> usize {
        self.workers.values().filter(|w| !w.is_closed()).count()
    }

    fn schedule(&mut self, workflow_name: String) {
        if !self.registry.contains(&workflow_name) {
            warn!(workflow = %workflow_name, "schedule for unknown workflow dropped");
            return;
        }

        // A START may already have claimed the next name.
        let counter = self.counters.entry(workflow_name.clone()).or_insert(0);
        let instance_name = loop {
            *counter += 1;
            let candidate = instance_name(&workflow_name, *counter);
            if !self.created.contains(&candidate) {
                break candidate;
            }
        };
        info!(workflow = %workflow_name, instance = %instance_name, "scheduling instance");

        let worker = self.spawn_worker(&instance_name);
        worker.tell(InstanceCommand::Create {
            workflow_name,
            instance_name,
        });
    }

    fn forward(&self, instance_name: &str, cmd: InstanceCommand) {
        match self.workers.get(instance_name) {
            Some(worker) => worker.tell(cmd),
            None => debug!(instance = instance_name, ?cmd, "no live worker, command dropped"),
        }
    }

    fn spawn_worker(&mut self, instance_name: &str) -> Address<InstanceCommand> {
        let (address, rx) = mailbox("instance");
        let worker = InstanceWorker::new(instance_name, self.decider.clone(), self.reporter.clone());
        tokio::spawn(worker.run(rx));
        self.created.insert(instance_name.to_owned());
        self.workers.insert(instance_name.to_owned(), address.clone());
        address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ReportEvent, WorkflowEventKind};
    use crate::models::Workflow;
    use crate::repository::ContextualInputStore;

    struct Probe {
        coordinator: Coordinator,
        decider: mpsc::UnboundedReceiver<DeciderEvent>,
        reporter: mpsc::UnboundedReceiver<ReporterMessage>,
    }

    fn probe(workflows: &[&str]) -> Probe {
        let registry = Arc::new(WorkflowRegistry::new(Arc::new(ContextualInputStore::new())));
        for name in workflows {
            registry.save(Workflow::new(*name));
        }
        let (decider, decider_rx) = mailbox("decider");
        let (reporter, reporter_rx) = mailbox("reporter");
        Probe {
            coordinator: Coordinator::new(registry, decider, reporter),
            decider: decider_rx,
            reporter: reporter_rx,
        }
    }

    async fn next_workflow_event(rx: &mut mpsc::UnboundedReceiver<DeciderEvent>) -> (WorkflowEventKind, String) {
        match rx.recv().await {
            Some(DeciderEvent::Workflow(e)) => (e.kind, e.instance_name),
            other => panic!("expected workflow event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn schedule_names_instances_with_a_counter() {
        let mut p = probe(&["W"]);
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "W".into() });
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "W".into() });

        let mut names = vec![
            next_workflow_event(&mut p.decider).await.1,
            next_workflow_event(&mut p.decider).await.1,
        ];
        names.sort();
        assert_eq!(names, vec!["W-1".to_string(), "W-2".to_string()]);
    }

    #[tokio::test]
    async fn counters_are_per_workflow() {
        let mut p = probe(&["A", "B"]);
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "A".into() });
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "B".into() });

        let mut names = vec![
            next_workflow_event(&mut p.decider).await.1,
            next_workflow_event(&mut p.decider).await.1,
        ];
        names.sort();
        assert_eq!(names, vec!["A-1".to_string(), "B-1".to_string()]);
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_scheduled() {
        let mut p = probe(&[]);
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "ghost".into() });
        assert_eq!(p.coordinator.live_workers(), 0);
        assert!(p.decider.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_without_worker_creates_the_instance() {
        let mut p = probe(&["W"]);
        p.coordinator.handle(WorkflowCommand::Start {
            workflow_name: "W".into(),
            instance_name: "W-9".into(),
        });

        assert_eq!(
            next_workflow_event(&mut p.decider).await,
            (WorkflowEventKind::Scheduled, "W-9".to_string())
        );
    }

    #[tokio::test]
    async fn start_on_live_worker_starts_it() {
        let mut p = probe(&["W"]);
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "W".into() });
        p.coordinator.handle(WorkflowCommand::Start {
            workflow_name: "W".into(),
            instance_name: "W-1".into(),
        });

        assert_eq!(next_workflow_event(&mut p.decider).await.0, WorkflowEventKind::Scheduled);
        assert_eq!(next_workflow_event(&mut p.decider).await.0, WorkflowEventKind::Started);
        assert!(matches!(
            p.reporter.recv().await,
            Some(ReporterMessage::Report(ReportEvent::Workflow(_)))
        ));
    }

    #[tokio::test]
    async fn stop_for_unknown_instance_is_dropped() {
        let mut p = probe(&["W"]);
        p.coordinator.handle(WorkflowCommand::Stop {
            workflow_name: "W".into(),
            instance_name: "W-1".into(),
        });
        assert_eq!(p.coordinator.live_workers(), 0);
        assert!(p.decider.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminated_workers_are_pruned() {
        let mut p = probe(&["W"]);
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "W".into() });
        p.coordinator.handle(WorkflowCommand::Cancel {
            workflow_name: "W".into(),
            instance_name: "W-1".into(),
        });
        assert_eq!(next_workflow_event(&mut p.decider).await.0, WorkflowEventKind::Scheduled);
        assert_eq!(next_workflow_event(&mut p.decider).await.0, WorkflowEventKind::Canceled);

        // Let the worker task observe its terminal state and exit.
        wait_for_shutdown(&p.coordinator).await;

        // Counters survive worker shutdown.
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "W".into() });
        assert_eq!(next_workflow_event(&mut p.decider).await.1, "W-2");
    }

    async fn wait_for_shutdown(coordinator: &Coordinator) {
        for _ in 0..10 {
            if coordinator.live_workers() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(coordinator.live_workers(), 0);
    }

    #[tokio::test]
    async fn start_never_recreates_a_finished_instance() {
        let mut p = probe(&["W"]);
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "W".into() });
        p.coordinator.handle(WorkflowCommand::Complete {
            workflow_name: "W".into(),
            instance_name: "W-1".into(),
        });
        assert_eq!(next_workflow_event(&mut p.decider).await.0, WorkflowEventKind::Scheduled);
        assert_eq!(next_workflow_event(&mut p.decider).await.0, WorkflowEventKind::Completed);
        wait_for_shutdown(&p.coordinator).await;

        p.coordinator.handle(WorkflowCommand::Start {
            workflow_name: "W".into(),
            instance_name: "W-1".into(),
        });
        tokio::task::yield_now().await;

        assert_eq!(p.coordinator.live_workers(), 0);
        assert!(p.decider.try_recv().is_err());
    }

    #[tokio::test]
    async fn schedule_skips_names_claimed_by_start() {
        let mut p = probe(&["W"]);
        p.coordinator.handle(WorkflowCommand::Start {
            workflow_name: "W".into(),
            instance_name: "W-1".into(),
        });
        p.coordinator.handle(WorkflowCommand::Schedule { workflow_name: "W".into() });

        let mut names = vec![
            next_workflow_event(&mut p.decider).await.1,
            next_workflow_event(&mut p.decider).await.1,
        ];
        names.sort();
        assert_eq!(names, vec!["W-1".to_string(), "W-2".to_string()]);
    }
}
