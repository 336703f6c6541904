//! End-to-end check that quick mode pins the real search tool's depth
//! profile before the provider sees the request.

use async_trait::async_trait;
use periscope_agent::{Researcher, SearchMode};
use periscope_core::error::{RuntimeError, ToolError};
use periscope_core::event::EventBus;
use periscope_core::message::{ChatId, Message};
use periscope_core::part::{Part, ToolState};
use periscope_core::runtime::{ModelRuntime, RequestedToolCall, StepOutput, StepRequest};
use periscope_core::tool::ToolRegistry;
use periscope_tools::{
    ProviderRequest, SearchDepth, SearchProvider, SearchResponse, SearchResult, SearchTool,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

struct DepthRecordingProvider {
    depths: Mutex<Vec<SearchDepth>>,
}

#[async_trait]
impl SearchProvider for DepthRecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    async fn search(&self, request: &ProviderRequest) -> Result<SearchResponse, ToolError> {
        self.depths.lock().unwrap().push(request.depth);
        Ok(SearchResponse {
            results: vec![SearchResult {
                url: "https://doc.rust-lang.org".into(),
                title: "Rust docs".into(),
                snippet: "Official documentation".into(),
                score: Some(1.0),
            }],
            images: vec![],
            answer: None,
        })
    }
}

struct OneSearchRuntime {
    steps: Mutex<u32>,
}

#[async_trait]
impl ModelRuntime for OneSearchRuntime {
    fn name(&self) -> &str {
        "one-search"
    }

    async fn step(&self, _request: StepRequest) -> Result<StepOutput, RuntimeError> {
        let mut steps = self.steps.lock().unwrap();
        *steps += 1;
        if *steps == 1 {
            Ok(StepOutput {
                text: String::new(),
                tool_calls: vec![RequestedToolCall {
                    id: "call_1".into(),
                    name: "search".into(),
                    arguments: json!({"query": "rust docs", "type": "advanced"}),
                }],
            })
        } else {
            Ok(StepOutput {
                text: "See the official docs.".into(),
                tool_calls: vec![],
            })
        }
    }
}

#[tokio::test]
async fn quick_mode_overrides_depth_through_the_real_search_tool() {
    let provider = Arc::new(DepthRecordingProvider {
        depths: Mutex::new(Vec::new()),
    });
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchTool::new(provider.clone())));

    let runtime: Arc<dyn ModelRuntime> = Arc::new(OneSearchRuntime {
        steps: Mutex::new(0),
    });
    let agent = Researcher::new(
        move || Ok(runtime),
        Arc::new(registry),
        Arc::new(EventBus::default()),
    )
    .unwrap();

    let (_abort_tx, abort_rx) = watch::channel(false);
    let history = vec![Message::user(ChatId::new(), "where are the rust docs")];
    let parts = agent
        .run(&history, SearchMode::Quick, abort_rx, None)
        .await
        .unwrap();

    // The provider saw basic depth despite the model asking for advanced.
    assert_eq!(
        provider.depths.lock().unwrap().as_slice(),
        &[SearchDepth::Basic]
    );

    // And the run produced a completed search part followed by the answer.
    let tool_part = parts
        .iter()
        .find_map(|p| match p {
            Part::Tool(tp) => Some(tp),
            _ => None,
        })
        .expect("search part present");
    assert_eq!(tool_part.state, ToolState::OutputAvailable);
    assert!(parts.iter().any(
        |p| matches!(p, Part::Text { text } if text == "See the official docs.")
    ));
}
