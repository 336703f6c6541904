//! Tool trait — the abstraction over researcher capabilities.
//!
//! Tools are what give the researcher the ability to act: search the web,
//! fetch a page, ask the user a clarifying question, manage its plan.
//!
//! Execution does not return a single value. Each invocation produces a
//! finite, non-restartable sequence of state-tagged events: first an event
//! echoing the validated input, then exactly one terminal event carrying
//! either the result payload or an error.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Per-invocation execution context.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// The call identifier assigned by the model runtime.
    pub call_id: String,

    /// Cooperative abort signal; flips to `true` when the surrounding
    /// request is cancelled.
    pub abort: watch::Receiver<bool>,
}

impl ToolContext {
    pub fn new(call_id: impl Into<String>, abort: watch::Receiver<bool>) -> Self {
        Self {
            call_id: call_id.into(),
            abort,
        }
    }

    /// A context with an abort signal that never fires. Test helper.
    pub fn detached(call_id: impl Into<String>) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            call_id: call_id.into(),
            abort: rx,
        }
    }

    /// Resolves once the abort signal fires.
    ///
    /// If the signal side has been dropped without firing, it can never
    /// fire, so this pends forever instead of resolving spuriously.
    pub async fn aborted(&self) {
        let mut rx = self.abort.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

/// An event in a tool's execution sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ToolEvent {
    /// The validated input, echoed before work begins.
    InputAvailable {
        call_id: String,
        input: serde_json::Value,
    },

    /// Successful terminal event.
    OutputAvailable {
        call_id: String,
        output: serde_json::Value,
    },

    /// Error terminal event.
    OutputError { call_id: String, message: String },
}

impl ToolEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OutputAvailable { .. } | Self::OutputError { .. })
    }
}

/// Single-consumer event sequence produced by one tool invocation.
pub type ToolEventStream = mpsc::Receiver<ToolEvent>;

/// The core Tool trait.
///
/// Each tool (search, fetch, question, todoWrite, todoRead) implements this
/// trait. Tools are registered in the ToolRegistry and made available to the
/// researcher under the active mode's allow-list.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search", "fetch").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    ///
    /// Returns the event stream immediately; work happens as the stream is
    /// consumed. Input validation failures are reported as an error return,
    /// execution failures as an `OutputError` terminal event.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: ToolContext,
    ) -> std::result::Result<ToolEventStream, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The researcher uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Look up and execute tools when the model requests them
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// A new registry containing only the named tools that exist here.
    pub fn subset(&self, names: &[&str]) -> ToolRegistry {
        let mut out = ToolRegistry::new();
        for name in names {
            if let Some(tool) = self.tools.get(*name) {
                out.register(Arc::clone(tool));
            }
        }
        out
    }

    /// Execute a named tool, returning its event stream.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: ToolContext,
    ) -> std::result::Result<ToolEventStream, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments, ctx).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
