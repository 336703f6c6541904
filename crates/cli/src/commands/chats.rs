//! `periscope chats` — list stored conversations for the local user.

use anyhow::Context;
use periscope_config::AppConfig;
use periscope_storage::ChatStore;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    let store = ChatStore::new(&config.db_path())
        .await
        .context("opening chat store")?;

    let user = super::local_user();
    let chats = store.list_chats(&user).await?;
    if chats.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }

    for chat in chats {
        println!(
            "{}  {}  [{}]  {}",
            chat.created_at.format("%Y-%m-%d %H:%M"),
            chat.id,
            chat.visibility.as_str(),
            chat.title
        );
    }
    Ok(())
}
