//! Conversation orchestration for Periscope.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, PrepareRequest, Prepared, SaveHandle, TriggerKind};
