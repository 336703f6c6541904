//! Fetch tool — retrieves the content of a single URL.
//!
//! The actual HTTP work lives behind the [`ContentFetcher`] trait so tests
//! can run without network access; [`HttpContentFetcher`] is the reqwest
//! implementation.

use async_trait::async_trait;
use periscope_core::error::ToolError;
use periscope_core::tool::{Tool, ToolContext, ToolEvent, ToolEventStream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_BYTES: usize = 256 * 1024;
const USER_AGENT: &str = "periscope/0.1 (+https://github.com/periscope-ai/periscope)";

/// Fetched page content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedContent {
    pub url: String,
    pub content_type: String,
    pub content: String,
}

/// External collaborator that retrieves raw content for a URL.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, ToolError>;
}

/// reqwest-backed fetcher with a response size cap.
pub struct HttpContentFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpContentFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for HttpContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, ToolError> {
        let response = self
            .client
            .get(url)
            .header("user-agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "fetch".into(),
                reason: format!("{url} returned {status}"),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut content = response
            .text()
            .await
            .map_err(|e| ToolError::Network(e.to_string()))?;
        if content.len() > self.max_bytes {
            let mut cut = self.max_bytes;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
        }

        Ok(FetchedContent {
            url: url.to_string(),
            content_type,
            content,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FetchInput {
    url: String,
}

/// The fetch tool.
pub struct FetchTool {
    fetcher: Arc<dyn ContentFetcher>,
    timeout: Duration,
}

impl FetchTool {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self {
            fetcher,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for FetchTool {
    fn name(&self) -> &str {
        "fetch"
    }

    fn description(&self) -> &str {
        "Fetch the content of a URL. Returns the page content and content type."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch (http or https)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        arguments: Value,
        ctx: ToolContext,
    ) -> Result<ToolEventStream, ToolError> {
        let input: FetchInput = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if !input.url.starts_with("http://") && !input.url.starts_with("https://") {
            return Err(ToolError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let fetcher = Arc::clone(&self.fetcher);
        let timeout = self.timeout;
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let call_id = ctx.call_id.clone();
            let _ = tx
                .send(ToolEvent::InputAvailable {
                    call_id: call_id.clone(),
                    input: json!({"url": input.url}),
                })
                .await;

            let work = async {
                match tokio::time::timeout(timeout, fetcher.fetch(&input.url)).await {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::Timeout {
                        tool_name: "fetch".into(),
                        timeout_secs: timeout.as_secs(),
                    }),
                }
            };

            let event = tokio::select! {
                _ = ctx.aborted() => ToolEvent::OutputError {
                    call_id,
                    message: "cancelled".into(),
                },
                outcome = work => match outcome {
                    Ok(fetched) => ToolEvent::OutputAvailable {
                        call_id,
                        output: serde_json::to_value(&fetched).unwrap_or(Value::Null),
                    },
                    Err(e) => ToolEvent::OutputError {
                        call_id,
                        message: e.to_string(),
                    },
                },
            };
            let _ = tx.send(event).await;
        });
        Ok(rx)
    }
}
