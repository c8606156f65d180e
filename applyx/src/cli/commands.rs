//! CLI command execution.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::json;

use crate::config::{self, DataLayout, GeminiSettings, Settings};
use crate::rag::{IndexBuilder, TextSplitter, VectorIndex};
use crate::server::{self, CreateSessionResponse, SendResponse};

use super::args::{Cli, Commands, ModelArgs};

const HOUR: Duration = Duration::from_secs(60 * 60);

impl ModelArgs {
    fn gemini(&self) -> Result<GeminiSettings> {
        let mut gemini = GeminiSettings::new(self.api_key.clone())?;
        gemini.model.clone_from(&self.model);
        gemini.embedding_model.clone_from(&self.embedding_model);
        gemini.base_url.clone_from(&self.base_url);
        gemini.temperature = self.temperature;
        Ok(gemini)
    }
}

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    let layout = DataLayout::new(config::resolve_data_dir(cli.data_dir)?);

    match cli.command {
        Commands::Serve {
            host,
            port,
            model,
            model_timeout_secs,
            session_max_age_hours,
            sweep_interval_secs,
            index_dir,
            top_k,
            seed_file,
        } => {
            let mut settings = Settings::new(layout, model.gemini()?);
            settings.host = host;
            settings.port = port;
            settings.model_timeout = Duration::from_secs(model_timeout_secs);
            settings.session_max_age = HOUR.saturating_mul(
                u32::try_from(session_max_age_hours).unwrap_or(u32::MAX),
            );
            settings.sweep_interval = Duration::from_secs(sweep_interval_secs.max(1));
            if let Some(dir) = index_dir {
                settings.index_dir = dir;
            }
            settings.top_k = top_k;
            settings.seed_file = seed_file;
            server::start_server(settings).await
        }
        Commands::Index {
            docs_dir,
            index_dir,
            chunk_size,
            chunk_overlap,
            model,
        } => {
            let index_dir = index_dir.unwrap_or_else(|| layout.index_dir());
            build_index(&docs_dir, &index_dir, chunk_size, chunk_overlap, &model).await
        }
        Commands::Ask {
            session,
            chatbot,
            url,
            message,
        } => {
            let message = message.join(" ");
            if message.trim().is_empty() {
                bail!("Message is required for ask command");
            }
            let base = match url {
                Some(url) => url.trim_end_matches('/').to_string(),
                None => {
                    let port = server::get_server_port(&layout).unwrap_or(config::DEFAULT_PORT);
                    format!("http://127.0.0.1:{port}")
                }
            };
            let prefix = if chatbot { "chatbot" } else { "chat" };
            ask(&format!("{base}/{prefix}"), session, &message).await
        }
    }
}

async fn build_index(
    docs_dir: &Path,
    index_dir: &Path,
    chunk_size: usize,
    chunk_overlap: usize,
    model: &ModelArgs,
) -> Result<()> {
    if chunk_size == 0 {
        bail!("--chunk-size must be positive");
    }
    let gemini = model.gemini()?;
    let embedder = Arc::new(gemini.client());
    let builder = IndexBuilder::new(embedder, gemini.embedding_model.clone())
        .with_splitter(TextSplitter::new(chunk_size, chunk_overlap));

    let index = builder
        .build(docs_dir)
        .await
        .with_context(|| format!("Failed to index {}", docs_dir.display()))?;
    index
        .save(index_dir)
        .with_context(|| format!("Failed to write index to {}", index_dir.display()))?;

    println!(
        "Indexed {} chunks into {}",
        index.len(),
        VectorIndex::file_path(index_dir).display()
    );
    Ok(())
}

/// Send one message, creating a session first unless one was given.
async fn ask(base: &str, session: Option<String>, message: &str) -> Result<()> {
    let client = reqwest::Client::new();

    let session_id = match session {
        Some(id) => id,
        None => {
            let resp = client
                .post(format!("{base}/session"))
                .send()
                .await
                .with_context(|| format!("Failed to reach server at {base}"))?;
            if !resp.status().is_success() {
                bail!("Server returned {}", resp.status());
            }
            let created: CreateSessionResponse =
                resp.json().await.context("Failed to parse response")?;
            println!("Session ID: {}", created.session_id);
            created.session_id
        }
    };

    let resp = client
        .post(format!("{base}/send"))
        .json(&json!({ "session_id": session_id, "message": message }))
        .send()
        .await
        .context("Failed to send message")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let detail = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body["detail"].as_str().map(String::from))
            .unwrap_or_default();
        bail!("Server returned {status}: {detail}");
    }

    let reply: SendResponse = resp.json().await.context("Failed to parse response")?;
    println!("\n{}", reply.response);
    Ok(())
}
