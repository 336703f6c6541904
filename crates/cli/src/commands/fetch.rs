//! `periscope fetch` — fetch a URL and print its content.

use anyhow::bail;
use periscope_core::tool::{Tool, ToolContext, ToolEvent};
use periscope_tools::{FetchTool, HttpContentFetcher};
use serde_json::json;
use std::sync::Arc;

pub async fn run(url: &str) -> anyhow::Result<()> {
    let tool = FetchTool::new(Arc::new(HttpContentFetcher::new()));

    let mut stream = tool
        .execute(json!({"url": url}), ToolContext::detached("cli"))
        .await?;

    while let Some(event) = stream.recv().await {
        match event {
            ToolEvent::InputAvailable { .. } => {
                tracing::debug!("Fetching {url}…");
            }
            ToolEvent::OutputAvailable { output, .. } => {
                if let Some(content) = output["content"].as_str() {
                    println!("{content}");
                }
            }
            ToolEvent::OutputError { message, .. } => {
                bail!("fetch failed: {message}");
            }
        }
    }
    Ok(())
}
