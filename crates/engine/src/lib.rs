//! `engine` crate: workflow definitions, the shared stores, and the
//! message-driven runtime that schedules and tracks workflow instances.
//!
//! Runtime topology (every arrow is a fire-and-forget mailbox send):
//!
//! ```text
//! Engine::submit ─► Coordinator ─► InstanceWorker ─┬─► Decider ─┬─► Coordinator
//!                                                  │            └─► TaskExecutor ─► HttpClient
//!                                                  └─► Reporter ◄──────┘ (task reports)
//! ```

pub mod config;
pub mod coordinator;
pub mod decider;
pub mod error;
pub mod events;
pub mod executor;
pub mod instance;
pub mod mailbox;
pub mod models;
pub mod reporter;
pub mod repository;
pub mod runtime;
pub mod template;
pub mod validate;
pub mod worker;

pub use config::EngineConfig;
pub use error::EngineError;
pub use instance::{InstanceSummary, TaskInstance, TaskSummary, WorkflowInstance, WorkflowStatus};
pub use models::{
    Command, CommandOperation, Condition, ContextualInput, EventType, Handler, Header, HttpMethod,
    HttpRequest, Param, Task, Workflow,
};
pub use repository::{ContextualInputStore, WorkflowRegistry};
pub use runtime::{Engine, Operation, OperationKind};
pub use validate::validate_workflow;
