//! `periscope feedback` — record product feedback.

use anyhow::{Context, bail};
use periscope_config::AppConfig;
use periscope_core::message::{Feedback, Sentiment};
use periscope_storage::ChatStore;

pub async fn run(sentiment: &str, message: &str) -> anyhow::Result<()> {
    let Some(sentiment) = Sentiment::parse(sentiment) else {
        bail!("sentiment must be 'positive' or 'negative'");
    };
    if message.trim().is_empty() {
        bail!("feedback message must not be empty");
    }

    let config = AppConfig::load().context("loading configuration")?;
    let store = ChatStore::new(&config.db_path())
        .await
        .context("opening chat store")?;

    let feedback = Feedback::new(
        Some(super::local_user()),
        sentiment,
        message,
        "cli://feedback",
        concat!("periscope-cli/", env!("CARGO_PKG_VERSION")),
    );
    store.save_feedback(&feedback).await?;
    println!("Thanks — feedback recorded.");
    Ok(())
}
