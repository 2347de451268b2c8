//! Task executor.
//!
//! `TaskExecutor` is the worker behind every START_TASK command:
//! 1. Looks the task up in the registry.
//! 2. Allocates a fresh task instance name and resolves the request
//!    template against the contextual inputs.
//! 3. Emits TaskStarted / ReportTaskStarted before the call goes out.
//! 4. Issues the call on its own tokio task and reports the outcome:
//!    COMPLETED (response published as a local input), TIMEDOUT or FAILED.
//!
//! Calls are never retried.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use transport::{HttpClient, TransportError};

use crate::events::{
    DeciderEvent, ReportEvent, ReporterMessage, StartTask, TaskEvent, TaskEventKind, TaskReport,
};
use crate::mailbox::Address;
use crate::repository::{ContextualInputStore, WorkflowRegistry};
use crate::template;

pub struct TaskExecutor {
    registry: Arc<WorkflowRegistry>,
    inputs: Arc<ContextualInputStore>,
    client: Arc<dyn HttpClient>,
    decider: Address<DeciderEvent>,
    reporter: Address<ReporterMessage>,
}

impl TaskExecutor {
    pub fn new(
        registry: Arc<WorkflowRegistry>,
        inputs: Arc<ContextualInputStore>,
        client: Arc<dyn HttpClient>,
        decider: Address<DeciderEvent>,
        reporter: Address<ReporterMessage>,
    ) -> Self {
        Self {
            registry,
            inputs,
            client,
            decider,
            reporter,
        }
    }

    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<StartTask>) {
        while let Some(cmd) = rx.recv().await {
            self.handle(cmd);
        }
        debug!("task executor stopped");
    }

    /// Start one activation. Must be called from within a tokio runtime.
    pub fn handle(&self, cmd: StartTask) {
        let task = match self.registry.find_task(&cmd.workflow_name, &cmd.task_name) {
            Ok(task) => task,
            Err(err) => {
                warn!(instance = %cmd.workflow_instance_name, error = %err, "start task dropped");
                return;
            }
        };

        let activation = Activation {
            report: TaskReport {
                task_name: task.name.clone(),
                task_instance_name: Uuid::new_v4().to_string(),
                workflow_name: cmd.workflow_name,
                workflow_instance_name: cmd.workflow_instance_name,
            },
            response_key: task.response_key(),
            decider: self.decider.clone(),
            reporter: self.reporter.clone(),
        };

        let call = template::render(
            &task.http_request,
            &self.inputs,
            &activation.report.workflow_name,
            &activation.report.workflow_instance_name,
        );

        info!(
            workflow = %activation.report.workflow_name,
            instance = %activation.report.workflow_instance_name,
            task = %activation.report.task_name,
            task_instance = %activation.report.task_instance_name,
            method = %call.method,
            url = %call.url,
            "starting task"
        );
        activation.emit(TaskEventKind::Started, None);
        activation.reporter.tell(ReportEvent::TaskStarted(activation.report.clone()).into());

        let client = Arc::clone(&self.client);
        let inputs = Arc::clone(&self.inputs);
        tokio::spawn(async move {
            let outcome = client.send(call).await;
            activation.finish(&inputs, outcome);
        });
    }
}

/// Everything one in-flight activation needs to report its outcome.
struct Activation {
    report: TaskReport,
    response_key: String,
    decider: Address<DeciderEvent>,
    reporter: Address<ReporterMessage>,
}

impl Activation {
    fn finish(self, inputs: &ContextualInputStore, outcome: Result<String, TransportError>) {
        let instance = &self.report.workflow_instance_name;
        match outcome {
            Ok(response) => {
                info!(instance = %instance, task = %self.report.task_name, "task completed");
                inputs.save_local(instance, self.response_key.clone(), Some(response.clone()));
                self.emit(TaskEventKind::Completed, Some(response.clone()));
                self.reporter.tell(
                    ReportEvent::TaskCompleted {
                        task: self.report,
                        response,
                    }
                    .into(),
                );
            }
            Err(err) if err.is_timeout() => {
                warn!(instance = %instance, task = %self.report.task_name, error = %err, "task timed out");
                inputs.save_local(instance, self.response_key.clone(), None);
                self.emit(TaskEventKind::TimedOut, None);
                self.reporter.tell(ReportEvent::TaskTimedOut(self.report).into());
            }
            Err(err) => {
                warn!(instance = %instance, task = %self.report.task_name, error = %err, "task failed");
                inputs.save_local(instance, self.response_key.clone(), None);
                self.emit(TaskEventKind::Failed, None);
                self.reporter.tell(
                    ReportEvent::TaskFailed {
                        task: self.report,
                        failure: err.to_string(),
                    }
                    .into(),
                );
            }
        }
    }

    fn emit(&self, kind: TaskEventKind, response: Option<String>) {
        self.decider.tell(DeciderEvent::Task(TaskEvent {
            kind,
            task_name: self.report.task_name.clone(),
            workflow_name: self.report.workflow_name.clone(),
            workflow_instance_name: self.report.workflow_instance_name.clone(),
            response,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;
    use crate::models::{ContextualInput, Header, HttpMethod, HttpRequest, Task, Workflow};
    use transport::{MockBehaviour, MockHttpClient};

    struct Probe {
        executor: TaskExecutor,
        client: MockHttpClient,
        inputs: Arc<ContextualInputStore>,
        decider: mpsc::UnboundedReceiver<DeciderEvent>,
        reporter: mpsc::UnboundedReceiver<ReporterMessage>,
    }

    fn probe(client: MockHttpClient) -> Probe {
        let inputs = Arc::new(ContextualInputStore::new());
        let registry = Arc::new(WorkflowRegistry::new(inputs.clone()));
        let mut request = HttpRequest::new(HttpMethod::Get, "https://x/charge");
        request.headers = vec![Header {
            name: "X-Token".into(),
            value: "TOKEN".into(),
        }];
        registry.save(Workflow::new("order").with_task(Task::new("charge", request)));

        let (decider, decider_rx) = mailbox("decider");
        let (reporter, reporter_rx) = mailbox("reporter");
        Probe {
            executor: TaskExecutor::new(registry, inputs.clone(), Arc::new(client.clone()), decider, reporter),
            client,
            inputs,
            decider: decider_rx,
            reporter: reporter_rx,
        }
    }

    fn start(task: &str) -> StartTask {
        StartTask {
            task_name: task.into(),
            workflow_name: "order".into(),
            workflow_instance_name: "order-1".into(),
        }
    }

    async fn next_task_event(rx: &mut mpsc::UnboundedReceiver<DeciderEvent>) -> TaskEvent {
        match rx.recv().await {
            Some(DeciderEvent::Task(e)) => e,
            other => panic!("expected task event, got {other:?}"),
        }
    }

    async fn next_report(rx: &mut mpsc::UnboundedReceiver<ReporterMessage>) -> ReportEvent {
        match rx.recv().await {
            Some(ReporterMessage::Report(e)) => e,
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn success_publishes_response_as_local_input() {
        let mut p = probe(MockHttpClient::returning("paid"));
        p.inputs.save_global_inputs("order", [ContextualInput::new("TOKEN", "abc")]);
        p.executor.handle(start("charge"));

        assert_eq!(next_task_event(&mut p.decider).await.kind, TaskEventKind::Started);
        let completed = next_task_event(&mut p.decider).await;
        assert_eq!(completed.kind, TaskEventKind::Completed);
        assert_eq!(completed.response.as_deref(), Some("paid"));

        let started = match next_report(&mut p.reporter).await {
            ReportEvent::TaskStarted(report) => report,
            other => panic!("expected task started, got {other:?}"),
        };
        match next_report(&mut p.reporter).await {
            ReportEvent::TaskCompleted { task, response } => {
                assert_eq!(task.task_instance_name, started.task_instance_name);
                assert_eq!(response, "paid");
            }
            other => panic!("expected task completed, got {other:?}"),
        }

        assert_eq!(p.inputs.find_local("order-1", "${charge.response}").as_deref(), Some("paid"));
        let calls = p.client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].headers, vec![("X-Token".to_string(), "abc".to_string())]);
    }

    #[tokio::test]
    async fn every_activation_gets_a_fresh_name() {
        let mut p = probe(MockHttpClient::returning("ok"));
        p.executor.handle(start("charge"));
        p.executor.handle(start("charge"));

        let mut names = Vec::new();
        while names.len() < 2 {
            if let ReportEvent::TaskStarted(report) = next_report(&mut p.reporter).await {
                names.push(report.task_instance_name);
            }
        }
        assert_ne!(names[0], names[1]);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_timed_out() {
        let mut p = probe(MockHttpClient::timing_out());
        p.executor.handle(start("charge"));

        assert_eq!(next_task_event(&mut p.decider).await.kind, TaskEventKind::Started);
        assert_eq!(next_task_event(&mut p.decider).await.kind, TaskEventKind::TimedOut);
        next_report(&mut p.reporter).await;
        assert!(matches!(next_report(&mut p.reporter).await, ReportEvent::TaskTimedOut(_)));
        assert!(p.inputs.find_local("order-1", "${charge.response}").is_none());
    }

    #[tokio::test]
    async fn failure_carries_the_error_text() {
        let client = MockHttpClient::returning("ok").route("https://x/charge", MockBehaviour::Fail("refused".into()));
        let mut p = probe(client);
        p.executor.handle(start("charge"));

        next_report(&mut p.reporter).await;
        match next_report(&mut p.reporter).await {
            ReportEvent::TaskFailed { failure, .. } => assert!(failure.contains("refused")),
            other => panic!("expected task failed, got {other:?}"),
        }
        assert_eq!(next_task_event(&mut p.decider).await.kind, TaskEventKind::Started);
        assert_eq!(next_task_event(&mut p.decider).await.kind, TaskEventKind::Failed);
    }

    #[tokio::test]
    async fn unknown_task_is_dropped() {
        let mut p = probe(MockHttpClient::returning("ok"));
        p.executor.handle(start("refund"));

        tokio::task::yield_now().await;
        assert!(p.decider.try_recv().is_err());
        assert_eq!(p.client.call_count(), 0);
    }
}
