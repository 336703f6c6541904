//! `periscope search` — run a query through the configured search provider.

use anyhow::{Context, bail};
use periscope_config::AppConfig;
use periscope_core::tool::{Tool, ToolContext, ToolEvent};
use periscope_tools::{HttpSearchProvider, SearchTool};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(query: &str, max_results: usize, depth: &str) -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    let Some(endpoint) = config.search.endpoint.clone() else {
        bail!(
            "no search endpoint configured; set [search].endpoint in config.toml \
             or PERISCOPE_SEARCH_ENDPOINT"
        );
    };

    let provider = Arc::new(HttpSearchProvider::new(
        config.search.default_provider.clone(),
        endpoint,
        config.search.api_key.clone(),
    ));
    let tool = SearchTool::new(provider)
        .with_timeout(Duration::from_secs(config.search.timeout_secs))
        .with_cache(
            Duration::from_secs(config.search.cache_ttl_secs),
            config.search.cache_capacity,
        );

    let mut stream = tool
        .execute(
            json!({"query": query, "max_results": max_results, "type": depth}),
            ToolContext::detached("cli"),
        )
        .await?;

    while let Some(event) = stream.recv().await {
        match event {
            ToolEvent::InputAvailable { .. } => {
                tracing::debug!("Searching…");
            }
            ToolEvent::OutputAvailable { output, .. } => {
                if let Some(answer) = output["answer"].as_str() {
                    println!("{answer}\n");
                }
                if let Some(results) = output["results"].as_array() {
                    for (i, result) in results.iter().enumerate() {
                        println!(
                            "{}. {} — {}",
                            i + 1,
                            result["title"].as_str().unwrap_or("(untitled)"),
                            result["url"].as_str().unwrap_or("")
                        );
                        if let Some(snippet) = result["snippet"].as_str() {
                            println!("   {snippet}");
                        }
                    }
                }
            }
            ToolEvent::OutputError { message, .. } => {
                bail!("search failed: {message}");
            }
        }
    }
    Ok(())
}
