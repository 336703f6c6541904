//! ModelRuntime trait — the abstraction over the model-invocation runtime.
//!
//! The runtime is an external collaborator: given a system prompt, the
//! conversation so far, a tool subset, and an optional tool-choice override,
//! it produces one generation step (assistant text plus zero or more
//! requested tool calls). The researcher drives it step by step under the
//! active mode's budget.

use crate::error::RuntimeError;
use crate::message::{Message, Role};
use crate::part::Part;
use crate::tool::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// A message in the model's working context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ModelMessage {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<RequestedToolCall>,
    },
    /// A tool result fed back into the context, keyed by call id.
    ToolResult {
        call_id: String,
        content: serde_json::Value,
    },
}

impl ModelMessage {
    /// Flatten a domain message into model-context form.
    ///
    /// Text parts join into the content; terminal tool parts are appended
    /// as tool results so regeneration keeps what the researcher learned.
    pub fn from_message(message: &Message) -> Vec<ModelMessage> {
        let text = message.text();
        let mut out = match message.role {
            Role::User => vec![ModelMessage::User { content: text }],
            Role::Assistant => vec![ModelMessage::Assistant {
                content: text,
                tool_calls: Vec::new(),
            }],
        };
        for part in &message.parts {
            if let Part::Tool(tp) = part {
                if let Some(output) = &tp.output {
                    out.push(ModelMessage::ToolResult {
                        call_id: tp.call_id.clone(),
                        content: output.clone(),
                    });
                }
            }
        }
        out
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedToolCall {
    /// Unique call ID (matches the runtime's tool_call id)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// Per-step tool-choice override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides.
    Auto,
    /// The model must call this specific tool.
    Tool(String),
}

/// One generation step request.
#[derive(Clone)]
pub struct StepRequest {
    /// The mode's system directive.
    pub system_prompt: String,

    /// Conversation context, including folded-in tool results.
    pub messages: Vec<ModelMessage>,

    /// Tools the model may call this step.
    pub tools: Vec<ToolDefinition>,

    /// Optional forced tool choice for this step.
    pub tool_choice: Option<ToolChoice>,

    /// Cooperative abort signal the runtime must honor.
    pub abort: watch::Receiver<bool>,
}

/// The outcome of one generation step.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Assistant text emitted this step (may be empty).
    pub text: String,

    /// Tool calls the model wants executed before the next step.
    pub tool_calls: Vec<RequestedToolCall>,
}

/// The core ModelRuntime trait.
///
/// Implementations live outside this workspace; tests use mocks.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    /// A human-readable name for this runtime.
    fn name(&self) -> &str;

    /// Run one generation step.
    async fn step(&self, request: StepRequest) -> std::result::Result<StepOutput, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatId;
    use crate::part::{ToolName, ToolPart};
    use serde_json::json;

    #[test]
    fn user_message_flattens_to_one_entry() {
        let msg = Message::user(ChatId::new(), "hello");
        let ctx = ModelMessage::from_message(&msg);
        assert_eq!(ctx.len(), 1);
        assert!(matches!(&ctx[0], ModelMessage::User { content } if content == "hello"));
    }

    #[test]
    fn assistant_tool_outputs_fold_into_context() {
        let parts = vec![
            Part::Text {
                text: "Searching.".into(),
            },
            Part::Tool(
                ToolPart::input_available(ToolName::Search, "call_1", json!({"query": "rust"}))
                    .with_output(json!({"results": [1, 2]})),
            ),
        ];
        let msg = Message::assistant(ChatId::new(), parts);
        let ctx = ModelMessage::from_message(&msg);
        assert_eq!(ctx.len(), 2);
        assert!(matches!(&ctx[1], ModelMessage::ToolResult { call_id, .. } if call_id == "call_1"));
    }

    #[test]
    fn errored_tool_parts_do_not_fold() {
        let parts = vec![Part::Tool(
            ToolPart::input_available(ToolName::Fetch, "call_2", json!({"url": "https://x"}))
                .with_error("boom"),
        )];
        let msg = Message::assistant(ChatId::new(), parts);
        let ctx = ModelMessage::from_message(&msg);
        assert_eq!(ctx.len(), 1, "only the (empty) assistant text entry");
    }
}
