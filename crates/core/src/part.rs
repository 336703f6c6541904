//! Message parts — the atomic units of message content.
//!
//! A message owns an ordered sequence of parts. Parts are polymorphic:
//! plain text, model reasoning, file attachments, citation sources, tool
//! invocations in one of four lifecycle states, dynamic (runtime-discovered)
//! tool invocations, and namespaced data passthrough.
//!
//! The union also carries transient stream-only variants (`tool-call`,
//! `tool-result`, `step-result`, `step-continue`, `step-finish`) that appear
//! in raw generation batches but are never durable; the codec normalizes or
//! drops them on persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved namespace marker for runtime-discovered tool names.
///
/// A tool call whose name starts with this prefix did not come from the
/// static registry and is persisted through the `tool-dynamic` row shape.
pub const DYNAMIC_TOOL_PREFIX: &str = "mcp__";

/// Statically registered tool identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolName {
    Search,
    Fetch,
    Question,
    TodoWrite,
    TodoRead,
    /// Fallback identity for a tool-result whose call has no matching
    /// tool-call in the same batch.
    Unknown,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::Search,
        ToolName::Fetch,
        ToolName::Question,
        ToolName::TodoWrite,
        ToolName::TodoRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Fetch => "fetch",
            Self::Question => "question",
            Self::TodoWrite => "todoWrite",
            Self::TodoRead => "todoRead",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "search" => Some(Self::Search),
            "fetch" => Some(Self::Fetch),
            "question" => Some(Self::Question),
            "todoWrite" => Some(Self::TodoWrite),
            "todoRead" => Some(Self::TodoRead),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a tool invocation part. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

impl ToolState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputStreaming => "input-streaming",
            Self::InputAvailable => "input-available",
            Self::OutputAvailable => "output-available",
            Self::OutputError => "output-error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "input-streaming" => Some(Self::InputStreaming),
            "input-available" => Some(Self::InputAvailable),
            "output-available" => Some(Self::OutputAvailable),
            "output-error" => Some(Self::OutputError),
            _ => None,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OutputAvailable | Self::OutputError)
    }
}

/// Where a dynamic tool identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOrigin {
    Mcp,
    Dynamic,
}

impl ToolOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcp => "mcp",
            Self::Dynamic => "dynamic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mcp" => Some(Self::Mcp),
            "dynamic" => Some(Self::Dynamic),
            _ => None,
        }
    }
}

/// A statically-registered tool invocation part.
///
/// Invariants: `state` in `{output-available, output-error}` implies
/// `output` / `error_text` is present; input states imply `input` is present
/// and `output` absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPart {
    pub name: ToolName,
    pub call_id: String,
    pub state: ToolState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ToolPart {
    /// A fresh invocation part in the `input-available` state.
    pub fn input_available(name: ToolName, call_id: impl Into<String>, input: Value) -> Self {
        Self {
            name,
            call_id: call_id.into(),
            state: ToolState::InputAvailable,
            input: Some(input),
            output: None,
            error_text: None,
        }
    }

    /// Transition to the successful terminal state.
    pub fn with_output(mut self, output: Value) -> Self {
        self.state = ToolState::OutputAvailable;
        self.output = Some(output);
        self.error_text = None;
        self
    }

    /// Transition to the error terminal state.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.state = ToolState::OutputError;
        self.output = None;
        self.error_text = Some(message.into());
        self
    }
}

/// A runtime-discovered tool invocation.
///
/// The relational schema cannot grow a column set per dynamically-named
/// tool, so many logical identities collapse into one row shape carrying
/// the true name and origin as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicToolPart {
    pub tool_name: String,
    pub origin: ToolOrigin,
    pub call_id: String,
    pub state: ToolState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

/// The atomic unit of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text {
        text: String,
    },

    Reasoning {
        text: String,
    },

    File {
        media_type: String,
        filename: String,
        url: String,
    },

    SourceUrl {
        source_id: String,
        url: String,
        title: String,
    },

    SourceDocument {
        source_id: String,
        media_type: String,
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },

    Tool(ToolPart),

    #[serde(rename = "tool-dynamic")]
    DynamicTool(DynamicToolPart),

    /// Opaque namespaced passthrough (`data-<prefix>`).
    Data {
        prefix: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        content: Value,
    },

    /// Structural bookkeeping: a generation step began.
    StepStart,

    // --- Transient stream-only variants. Never durable. ---
    /// Raw tool-call event from the generation stream. May be malformed;
    /// the codec validates it before mapping.
    ToolCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },

    /// Raw tool-result event lacking its own type tag; the owning tool is
    /// derived by joining on `call_id` within the same batch.
    ToolResult {
        call_id: String,
        output: Value,
    },

    StepResult,
    StepContinue,
    StepFinish,
}

impl Part {
    /// The persisted type tag for this part, e.g. `text`, `tool-search`,
    /// `tool-dynamic`, `data-weather`.
    pub fn kind(&self) -> String {
        match self {
            Self::Text { .. } => "text".into(),
            Self::Reasoning { .. } => "reasoning".into(),
            Self::File { .. } => "file".into(),
            Self::SourceUrl { .. } => "source-url".into(),
            Self::SourceDocument { .. } => "source-document".into(),
            Self::Tool(tp) => format!("tool-{}", tp.name),
            Self::DynamicTool(_) => "tool-dynamic".into(),
            Self::Data { prefix, .. } => format!("data-{prefix}"),
            Self::StepStart => "step-start".into(),
            Self::ToolCall { .. } => "tool-call".into(),
            Self::ToolResult { .. } => "tool-result".into(),
            Self::StepResult => "step-result".into(),
            Self::StepContinue => "step-continue".into(),
            Self::StepFinish => "step-finish".into(),
        }
    }

    /// Whether this variant survives persistence at all.
    pub fn is_durable(&self) -> bool {
        !matches!(
            self,
            Self::ToolCall { .. }
                | Self::ToolResult { .. }
                | Self::StepResult
                | Self::StepContinue
                | Self::StepFinish
        )
    }
}
