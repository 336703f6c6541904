//! Periscope CLI — the main entry point.
//!
//! Commands:
//! - `search`   — Run a web search through the configured provider
//! - `fetch`    — Fetch a URL's content
//! - `chats`    — List stored conversations
//! - `feedback` — Submit product feedback

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "periscope",
    about = "Periscope — AI-powered conversational search",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the web through the configured provider
    Search {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 10)]
        max_results: usize,

        /// Search depth: basic, advanced, or multi
        #[arg(short, long, default_value = "basic")]
        depth: String,
    },

    /// Fetch the content of a URL
    Fetch {
        /// The URL to fetch
        url: String,
    },

    /// List stored conversations
    Chats,

    /// Submit product feedback
    Feedback {
        /// positive or negative
        sentiment: String,

        /// The feedback text
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Search {
            query,
            max_results,
            depth,
        } => commands::search::run(&query, max_results, &depth).await?,
        Commands::Fetch { url } => commands::fetch::run(&url).await?,
        Commands::Chats => commands::chats::run().await?,
        Commands::Feedback { sentiment, message } => {
            commands::feedback::run(&sentiment, &message).await?
        }
    }

    Ok(())
}
