//! Shared stores: the only state crossing worker boundaries without
//! message passing.
//!
//! Both stores are concurrency-safe maps; no business logic lives here.

pub mod inputs;
pub mod workflows;

pub use inputs::ContextualInputStore;
pub use workflows::WorkflowRegistry;
