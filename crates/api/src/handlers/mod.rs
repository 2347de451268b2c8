pub mod event_handlers;
pub mod instances;
pub mod operations;
pub mod tasks;
pub mod workflows;
