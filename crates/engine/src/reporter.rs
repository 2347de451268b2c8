//! Reporter: the single owner of every in-flight [`WorkflowInstance`].
//!
//! It records workflow transitions and task activations, promotes an
//! instance to RUNNING on its first task, detects completion by counting
//! terminated activations, and evicts instances on terminal events.
//! Evicted names are remembered so late events never resurrect them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::events::{
    ReportEvent, ReporterMessage, TaskReport, WorkflowCommand, WorkflowEvent, WorkflowEventKind,
};
use crate::instance::{InstanceSummary, TaskInstance, WorkflowInstance, WorkflowStatus};
use crate::mailbox::Address;
use crate::repository::{ContextualInputStore, WorkflowRegistry};

pub struct Reporter {
    instances: HashMap<String, WorkflowInstance>,
    /// Names of evicted instances.
    retired: HashSet<String>,
    registry: Arc<WorkflowRegistry>,
    inputs: Arc<ContextualInputStore>,
    coordinator: Address<WorkflowCommand>,
    summaries: broadcast::Sender<InstanceSummary>,
}

impl Reporter {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        inputs: Arc<ContextualInputStore>,
        coordinator: Address<WorkflowCommand>,
        summaries: broadcast::Sender<InstanceSummary>,
    ) -> Self {
        Self {
            instances: HashMap::new(),
            retired: HashSet::new(),
            registry,
            inputs,
            coordinator,
            summaries,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ReporterMessage>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg);
        }
        debug!("reporter stopped");
    }

    pub fn handle(&mut self, msg: ReporterMessage) {
        match msg {
            ReporterMessage::Report(event) => self.report(event),
            ReporterMessage::Inspect { instance_name, reply } => {
                let _ = reply.send(self.instances.get(&instance_name).cloned());
            }
            ReporterMessage::List { reply } => {
                let mut all: Vec<WorkflowInstance> = self.instances.values().cloned().collect();
                all.sort_by(|a, b| a.instance_name.cmp(&b.instance_name));
                let _ = reply.send(all);
            }
        }
    }

    pub fn instance(&self, instance_name: &str) -> Option<&WorkflowInstance> {
        self.instances.get(instance_name)
    }

    pub fn is_retired(&self, instance_name: &str) -> bool {
        self.retired.contains(instance_name)
    }

    fn report(&mut self, event: ReportEvent) {
        debug!(?event, "report event");
        match event {
            ReportEvent::Workflow(event) => self.on_workflow(event),
            ReportEvent::TaskStarted(task) => self.on_task_started(task),
            ReportEvent::TaskCompleted { task, response } => self.on_task_completed(task, response),
            ReportEvent::TaskTimedOut(task) => {
                self.on_task_ended(&task, None);
            }
            ReportEvent::TaskFailed { task, failure } => {
                self.on_task_ended(&task, Some(failure));
            }
        }
    }

    // ------------------------------------------------------------------
    // Workflow events
    // ------------------------------------------------------------------

    fn on_workflow(&mut self, event: WorkflowEvent) {
        if event.kind == WorkflowEventKind::Scheduled {
            self.on_scheduled(event);
            return;
        }

        let Some(instance) = self.instances.get_mut(&event.instance_name) else {
            debug!(instance = %event.instance_name, kind = ?event.kind, "no tracked instance, event dropped");
            return;
        };

        let now = Utc::now();
        match event.kind {
            WorkflowEventKind::Scheduled => {}
            WorkflowEventKind::Started => {
                instance.status = WorkflowStatus::Running;
                instance.start_time.get_or_insert(now);
                // resumed
                instance.end_time = None;
            }
            WorkflowEventKind::Stopped => {
                instance.status = WorkflowStatus::Paused;
                instance.end_time = Some(now);
            }
            WorkflowEventKind::Completed => instance.status = WorkflowStatus::Completed,
            WorkflowEventKind::Failed => instance.status = WorkflowStatus::Failed,
            WorkflowEventKind::Canceled => instance.status = WorkflowStatus::Cancelled,
        }

        if event.kind.is_terminal() {
            instance.end_time = Some(now);
            self.evict(&event.instance_name);
        }
    }

    fn on_scheduled(&mut self, event: WorkflowEvent) {
        if self.retired.contains(&event.instance_name) {
            debug!(instance = %event.instance_name, "instance already evicted, schedule dropped");
            return;
        }
        if self.instances.contains_key(&event.instance_name) {
            debug!(instance = %event.instance_name, "instance already tracked, schedule dropped");
            return;
        }
        let Some(workflow) = self.registry.find_by_name(&event.workflow_name) else {
            debug!(workflow = %event.workflow_name, "unknown workflow, no instance created");
            return;
        };

        let instance = WorkflowInstance::scheduled(
            event.workflow_name,
            event.instance_name.clone(),
            workflow.tasks.len(),
        );
        info!(
            workflow = %instance.workflow_name,
            instance = %instance.instance_name,
            count_tasks = instance.count_tasks,
            "tracking instance"
        );
        self.instances.insert(event.instance_name, instance);
    }

    fn evict(&mut self, instance_name: &str) {
        let Some(instance) = self.instances.remove(instance_name) else {
            return;
        };
        self.retired.insert(instance_name.to_owned());
        self.inputs.retire_local(instance_name);

        let summary = instance.summary();
        info!(
            workflow = %summary.workflow_name,
            instance = %summary.instance_name,
            status = %summary.status,
            elapsed_ms = ?summary.elapsed_ms,
            success = summary.success,
            "instance finished"
        );
        for task in &summary.tasks {
            info!(
                instance = %summary.instance_name,
                task = %task.task_name,
                task_instance = %task.task_instance_name,
                elapsed_ms = ?task.elapsed_ms,
                success = task.success,
                "task finished"
            );
        }

        // No subscribers is fine.
        let _ = self.summaries.send(summary);
    }

    // ------------------------------------------------------------------
    // Task events
    // ------------------------------------------------------------------

    fn on_task_started(&mut self, task: TaskReport) {
        let status = match self.instances.get(&task.workflow_instance_name) {
            Some(instance) => instance.status,
            None => {
                warn!(
                    instance = %task.workflow_instance_name,
                    task = %task.task_name,
                    "task started for untracked instance, dropped"
                );
                return;
            }
        };

        // First activation promotes the instance to RUNNING.
        if status == WorkflowStatus::Scheduled {
            self.on_workflow(WorkflowEvent::new(
                WorkflowEventKind::Started,
                task.workflow_name.clone(),
                task.workflow_instance_name.clone(),
            ));
        }

        if let Some(instance) = self.instances.get_mut(&task.workflow_instance_name) {
            let mut activation = TaskInstance::from_report(&task);
            activation.start_time = Some(Utc::now());
            instance.tasks.insert(task.task_instance_name, activation);
        }
    }

    fn on_task_completed(&mut self, task: TaskReport, response: String) {
        let Some(instance) = self.instances.get_mut(&task.workflow_instance_name) else {
            debug!(instance = %task.workflow_instance_name, task = %task.task_name, "late task completion dropped");
            return;
        };
        let Some(activation) = instance.tasks.get_mut(&task.task_instance_name) else {
            warn!(task_instance = %task.task_instance_name, "completion for unknown activation dropped");
            return;
        };
        activation.end_time = Some(Utc::now());
        activation.response = Some(response);

        if instance.is_terminated() {
            let (workflow_name, instance_name) = (instance.workflow_name.clone(), instance.instance_name.clone());
            info!(workflow = %workflow_name, instance = %instance_name, "all tasks terminated");

            self.on_workflow(WorkflowEvent::new(
                WorkflowEventKind::Completed,
                workflow_name.clone(),
                instance_name.clone(),
            ));
            self.coordinator.tell(WorkflowCommand::Complete {
                workflow_name,
                instance_name,
            });
        }
    }

    /// Timeouts and failures are recorded but never complete the instance.
    fn on_task_ended(&mut self, task: &TaskReport, failure: Option<String>) {
        let Some(instance) = self.instances.get_mut(&task.workflow_instance_name) else {
            debug!(instance = %task.workflow_instance_name, task = %task.task_name, "late task outcome dropped");
            return;
        };
        let Some(activation) = instance.tasks.get_mut(&task.task_instance_name) else {
            warn!(task_instance = %task.task_instance_name, "outcome for unknown activation dropped");
            return;
        };
        activation.end_time = Some(Utc::now());
        activation.failure = failure;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;
    use crate::models::{HttpMethod, HttpRequest, Task, Workflow};

    struct Probe {
        reporter: Reporter,
        coordinator: mpsc::UnboundedReceiver<WorkflowCommand>,
        summaries: broadcast::Receiver<InstanceSummary>,
        inputs: Arc<ContextualInputStore>,
    }

    fn probe(tasks: &[&str]) -> Probe {
        let inputs = Arc::new(ContextualInputStore::new());
        let registry = Arc::new(WorkflowRegistry::new(inputs.clone()));
        let mut workflow = Workflow::new("W");
        for name in tasks {
            workflow = workflow.with_task(Task::new(*name, HttpRequest::new(HttpMethod::Get, "https://x")));
        }
        registry.save(workflow);

        let (coordinator, coordinator_rx) = mailbox("coordinator");
        let (tx, summaries) = broadcast::channel(16);
        Probe {
            reporter: Reporter::new(registry, inputs.clone(), coordinator, tx),
            coordinator: coordinator_rx,
            summaries,
            inputs,
        }
    }

    fn workflow(kind: WorkflowEventKind, instance: &str) -> ReporterMessage {
        ReportEvent::Workflow(WorkflowEvent::new(kind, "W", instance)).into()
    }

    fn report(task: &str, id: &str) -> TaskReport {
        TaskReport {
            task_name: task.into(),
            task_instance_name: id.into(),
            workflow_name: "W".into(),
            workflow_instance_name: "W-1".into(),
        }
    }

    fn started(task: &str, id: &str) -> ReporterMessage {
        ReportEvent::TaskStarted(report(task, id)).into()
    }

    fn completed(task: &str, id: &str) -> ReporterMessage {
        ReportEvent::TaskCompleted {
            task: report(task, id),
            response: format!("{task}-ok"),
        }
        .into()
    }

    #[test]
    fn schedule_snapshots_the_task_count() {
        let mut p = probe(&["a", "b", "c"]);
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));

        let instance = p.reporter.instance("W-1").expect("tracked");
        assert_eq!(instance.count_tasks, 3);
        assert_eq!(instance.status, WorkflowStatus::Scheduled);
    }

    #[test]
    fn schedule_of_unknown_workflow_creates_nothing() {
        let mut p = probe(&[]);
        p.reporter
            .handle(ReportEvent::Workflow(WorkflowEvent::new(WorkflowEventKind::Scheduled, "ghost", "ghost-1")).into());
        assert!(p.reporter.instance("ghost-1").is_none());
    }

    #[test]
    fn first_task_promotes_instance_to_running() {
        let mut p = probe(&["a", "b"]);
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));
        p.reporter.handle(started("a", "a-1"));

        let instance = p.reporter.instance("W-1").expect("tracked");
        assert_eq!(instance.status, WorkflowStatus::Running);
        assert!(instance.start_time.is_some());
        assert!(instance.tasks["a-1"].start_time.is_some());
    }

    #[test]
    fn completes_only_after_every_task_terminates() {
        let mut p = probe(&["a", "b", "c"]);
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));
        for (task, id) in [("a", "a-1"), ("b", "b-1"), ("c", "c-1")] {
            p.reporter.handle(started(task, id));
        }

        p.reporter.handle(completed("a", "a-1"));
        p.reporter.handle(
            ReportEvent::TaskFailed {
                task: report("b", "b-1"),
                failure: "boom".into(),
            }
            .into(),
        );
        assert!(p.reporter.instance("W-1").is_some());
        assert!(p.coordinator.try_recv().is_err());

        p.reporter.handle(completed("c", "c-1"));
        assert!(p.reporter.instance("W-1").is_none());
        assert!(p.reporter.is_retired("W-1"));
        assert_eq!(
            p.coordinator.try_recv().ok(),
            Some(WorkflowCommand::Complete {
                workflow_name: "W".into(),
                instance_name: "W-1".into(),
            })
        );

        let summary = p.summaries.try_recv().expect("summary published");
        assert_eq!(summary.status, WorkflowStatus::Completed);
        assert!(summary.success);
        assert_eq!(summary.tasks.len(), 3);
        assert!(!summary.tasks.iter().find(|t| t.task_name == "b").expect("b").success);
    }

    #[test]
    fn failure_alone_does_not_complete() {
        let mut p = probe(&["a"]);
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));
        p.reporter.handle(started("a", "a-1"));
        p.reporter.handle(ReportEvent::TaskTimedOut(report("a", "a-1")).into());

        let instance = p.reporter.instance("W-1").expect("still tracked");
        assert!(instance.tasks["a-1"].is_terminated());
        assert!(p.coordinator.try_recv().is_err());
    }

    #[test]
    fn double_activation_completes_early() {
        // Activations are counted, not distinct tasks.
        let mut p = probe(&["a", "b"]);
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));
        p.reporter.handle(started("a", "a-1"));
        p.reporter.handle(started("a", "a-2"));
        p.reporter.handle(completed("a", "a-1"));
        p.reporter.handle(completed("a", "a-2"));

        assert!(p.reporter.is_retired("W-1"));
    }

    #[test]
    fn eviction_is_idempotent_and_final() {
        let mut p = probe(&["a"]);
        p.inputs.save_local("W-1", "${a.response}", Some("v".into()));
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));
        p.reporter.handle(workflow(WorkflowEventKind::Canceled, "W-1"));

        assert!(p.reporter.instance("W-1").is_none());
        assert!(p.inputs.find_local("W-1", "${a.response}").is_none());
        assert!(p.summaries.try_recv().is_ok());

        p.reporter.handle(workflow(WorkflowEventKind::Canceled, "W-1"));
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));
        p.reporter.handle(started("a", "a-9"));
        p.reporter.handle(completed("a", "a-9"));

        assert!(p.reporter.instance("W-1").is_none());
        assert!(p.summaries.try_recv().is_err());
        assert!(p.coordinator.try_recv().is_err());
    }

    #[test]
    fn task_before_schedule_is_dropped() {
        let mut p = probe(&["a"]);
        p.reporter.handle(started("a", "a-1"));
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));

        let instance = p.reporter.instance("W-1").expect("tracked");
        assert!(instance.tasks.is_empty());
        assert_eq!(instance.status, WorkflowStatus::Scheduled);
    }

    #[test]
    fn stop_pauses_without_evicting() {
        let mut p = probe(&["a"]);
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));
        p.reporter.handle(workflow(WorkflowEventKind::Started, "W-1"));
        p.reporter.handle(workflow(WorkflowEventKind::Stopped, "W-1"));

        let instance = p.reporter.instance("W-1").expect("tracked");
        assert_eq!(instance.status, WorkflowStatus::Paused);
        assert!(instance.end_time.is_some());

        p.reporter.handle(workflow(WorkflowEventKind::Started, "W-1"));
        let instance = p.reporter.instance("W-1").expect("tracked");
        assert_eq!(instance.status, WorkflowStatus::Running);
        assert!(instance.end_time.is_none());
    }

    #[tokio::test]
    async fn answers_snapshot_queries() {
        let mut p = probe(&["a"]);
        p.reporter.handle(workflow(WorkflowEventKind::Scheduled, "W-1"));

        let (reply, rx) = tokio::sync::oneshot::channel();
        p.reporter.handle(ReporterMessage::Inspect {
            instance_name: "W-1".into(),
            reply,
        });
        assert_eq!(rx.await.expect("reply").map(|i| i.instance_name), Some("W-1".to_string()));

        let (reply, rx) = tokio::sync::oneshot::channel();
        p.reporter.handle(ReporterMessage::List { reply });
        assert_eq!(rx.await.expect("reply").len(), 1);
    }
}
