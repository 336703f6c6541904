//! # Periscope Core
//!
//! Domain types, traits, and error definitions for the Periscope
//! conversational search runtime. This crate has **zero framework
//! dependencies** — it defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (model runtime, search vendors, storage) is
//! defined as a trait here. Implementations live in their respective crates.
//! This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod message;
pub mod part;
pub mod runtime;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{
    CodecError, Error, OrchestratorError, Result, RuntimeError, StorageError, ToolError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{Chat, ChatId, Feedback, Message, MessageId, Role, Sentiment, UserId, Visibility};
pub use part::{
    DYNAMIC_TOOL_PREFIX, DynamicToolPart, Part, ToolName, ToolOrigin, ToolPart, ToolState,
};
pub use runtime::{
    ModelMessage, ModelRuntime, RequestedToolCall, StepOutput, StepRequest, ToolChoice,
};
pub use tool::{Tool, ToolContext, ToolDefinition, ToolEvent, ToolEventStream, ToolRegistry};
