//! Mode policy — maps a search mode to its execution plan.
//!
//! A plan is a pure function of the mode (and whether a streaming sink is
//! present): a system directive, a tool allow-list, a step budget, and an
//! optional first-step tool forcing.

use async_trait::async_trait;
use periscope_core::error::ToolError;
use periscope_core::tool::{Tool, ToolContext, ToolEventStream, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// The three search modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Fast answers: small step budget, search and fetch only.
    Quick,
    /// Plan first: the researcher must draft a todo list before anything else.
    Planning,
    /// Let the researcher decide.
    #[default]
    Adaptive,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Planning => "planning",
            Self::Adaptive => "adaptive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quick" => Some(Self::Quick),
            "planning" => Some(Self::Planning),
            "adaptive" => Some(Self::Adaptive),
            _ => None,
        }
    }
}

const QUICK_PROMPT: &str = "You are a research assistant optimized for fast, direct answers. \
Search the web, read what you need, and answer concisely with citations. \
Do not over-search: one or two good queries usually suffice.";

const PLANNING_PROMPT: &str = "You are a thorough research assistant. \
Before taking any other action, draft a research plan as a todo list. \
Work through the plan step by step, updating it as you learn, and cite every claim.";

const ADAPTIVE_PROMPT: &str = "You are a research assistant. \
Judge the complexity of the request yourself: answer simple questions directly \
after a quick search, and break harder ones into a planned investigation. \
Cite every claim you make.";

/// The resolved execution plan for a mode.
#[derive(Debug, Clone)]
pub struct ModePlan {
    pub mode: SearchMode,
    pub system_prompt: String,
    pub allowed_tools: Vec<&'static str>,
    pub max_steps: u32,
    pub force_first_tool: Option<&'static str>,
}

impl ModePlan {
    /// Resolve the plan for `mode`.
    ///
    /// The todo tools are only usable when a result-streaming sink is
    /// present (the plan is rendered live); without one they are withheld
    /// and planning mode cannot force them.
    pub fn for_mode(mode: SearchMode, has_sink: bool) -> Self {
        match mode {
            SearchMode::Quick => Self {
                mode,
                system_prompt: QUICK_PROMPT.into(),
                allowed_tools: vec!["search", "fetch"],
                max_steps: 20,
                force_first_tool: None,
            },
            SearchMode::Planning => {
                let mut allowed = vec!["search", "fetch"];
                if has_sink {
                    allowed.push("todoWrite");
                    allowed.push("todoRead");
                }
                Self {
                    mode,
                    system_prompt: PLANNING_PROMPT.into(),
                    allowed_tools: allowed,
                    max_steps: 50,
                    force_first_tool: has_sink.then_some("todoWrite"),
                }
            }
            SearchMode::Adaptive => {
                let mut allowed = vec!["search", "fetch"];
                if has_sink {
                    allowed.push("todoWrite");
                    allowed.push("todoRead");
                }
                Self {
                    mode,
                    system_prompt: ADAPTIVE_PROMPT.into(),
                    allowed_tools: allowed,
                    max_steps: 50,
                    force_first_tool: None,
                }
            }
        }
    }

    /// Build the registry this mode actually exposes to the model.
    ///
    /// Quick mode wraps the search tool so its depth profile is pinned
    /// regardless of what the model supplies.
    pub fn tool_registry(&self, base: &ToolRegistry) -> ToolRegistry {
        let mut registry = base.subset(&self.allowed_tools);
        if self.mode == SearchMode::Quick {
            if let Some(search) = registry.get("search") {
                registry.register(Arc::new(QuickSearchTool::new(search)));
            }
        }
        registry
    }
}

/// Wraps the search tool for quick mode: the caller-supplied `type` input is
/// overridden to the basic profile before delegating. All intermediate and
/// terminal streamed events pass through unmodified.
pub struct QuickSearchTool {
    inner: Arc<dyn Tool>,
}

impl QuickSearchTool {
    pub fn new(inner: Arc<dyn Tool>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Tool for QuickSearchTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }

    async fn execute(
        &self,
        mut arguments: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolEventStream, ToolError> {
        if let Some(object) = arguments.as_object_mut() {
            object.insert("type".into(), json!("basic"));
        }
        self.inner.execute(arguments, ctx).await
    }
}
