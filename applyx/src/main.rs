//! ApplyX - backend for an admissions counseling chatbot.
//!
//! Two chat surfaces share one orchestrator type:
//! - `/chat` runs the ikigai career survey from a seeded preamble
//! - `/chatbot` answers admissions questions from an indexed document corpus
//!
//! A single student profile is kept as a JSON file next to saved survey
//! results. The model behind both surfaces is Gemini.

mod chat;
mod cli;
mod config;
mod error;
mod llm;
mod models;
mod preamble;
mod profile;
mod rag;
mod results;
mod server;
mod session;

use anyhow::Result;
use clap::Parser;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = config::load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env"),
    }
    execute(cli).await
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("APPLYX_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
