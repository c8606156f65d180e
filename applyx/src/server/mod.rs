//! ApplyX HTTP server.
//!
//! Endpoints:
//! - GET / - Greeting
//! - /chat/... - Survey chat (seed preamble), plus saveResult/getResult
//! - /chatbot/... - Document-grounded chat (only when an index is loaded)
//! - /profile/{save,get,update,delete} - The single stored profile
//!
//! While running, the server records its PID and port under the data
//! directory so `applyx ask` can find it.

mod chat;
mod error;
mod profile;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::chat::{ChatMode, Orchestrator};
use crate::config::{DataLayout, Settings};
use crate::llm::{ChatModel, Embedder};
use crate::preamble::Preamble;
use crate::profile::ProfileStore;
use crate::rag::{Retriever, VectorIndex};
use crate::results::ResultStore;
use crate::session::InMemorySessionStore;

pub use chat::{CreateSessionResponse, SendResponse};
use chat::Surface;

/// Everything the routes serve.
pub struct ServerState {
    pub chat: Arc<Orchestrator>,
    /// Absent when no retrieval index could be loaded.
    pub chatbot: Option<Arc<Orchestrator>>,
    pub profiles: ProfileStore,
}

pub fn build_router(state: &ServerState) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .nest(
            "/chat",
            chat::routes(Arc::new(chat::ChatApi {
                orchestrator: Arc::clone(&state.chat),
                surface: Surface::Chat,
            })),
        )
        .nest("/profile", profile::routes(state.profiles.clone()));

    if let Some(chatbot) = &state.chatbot {
        app = app.nest(
            "/chatbot",
            chat::routes(Arc::new(chat::ChatApi {
                orchestrator: Arc::clone(chatbot),
                surface: Surface::Chatbot,
            })),
        );
    }

    app.layer(CorsLayer::very_permissive())
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Hello World" }))
}

/// Wire up orchestrators and stores from settings, using `model` and
/// `embedder` for every outbound call.
pub fn assemble(
    settings: &Settings,
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn Embedder>,
) -> Result<ServerState> {
    let preamble = match &settings.seed_file {
        Some(path) => Preamble::from_file(path)
            .with_context(|| format!("Failed to load seed preamble {}", path.display()))?,
        None => Preamble::builtin().context("Built-in seed preamble is invalid")?,
    };
    info!(
        version = preamble.version(),
        start_phrase = preamble.start_phrase(),
        scripted_questions = preamble.scripted_question_count(),
        "Seed preamble ready"
    );

    let chat = Orchestrator::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::clone(&model),
        ChatMode::Plain {
            preamble: Arc::new(preamble),
        },
    )
    .with_timeout(settings.model_timeout)
    .with_results(ResultStore::new(settings.layout.results_dir()));

    let chatbot = match VectorIndex::load(&settings.index_dir) {
        Ok(index) if index.is_empty() => {
            warn!(
                path = %settings.index_dir.display(),
                "Vector index has no chunks, /chatbot routes are not mounted"
            );
            None
        }
        Ok(index) => {
            if index.embedding_model() != settings.gemini.embedding_model {
                warn!(
                    index_model = index.embedding_model(),
                    configured = %settings.gemini.embedding_model,
                    "Index was built with a different embedding model"
                );
            }
            let chunks = index.len();
            let retriever = Retriever::new(index, embedder).with_top_k(settings.top_k);
            info!(chunks, top_k = retriever.top_k(), "Retrieval chat enabled");
            Some(Arc::new(
                Orchestrator::new(
                    Arc::new(InMemorySessionStore::new()),
                    model,
                    ChatMode::Retrieval(Arc::new(retriever)),
                )
                .with_timeout(settings.model_timeout),
            ))
        }
        Err(e) => {
            warn!(error = %e, "Retrieval chat disabled, /chatbot routes are not mounted");
            None
        }
    };

    Ok(ServerState {
        chat: Arc::new(chat),
        chatbot,
        profiles: ProfileStore::new(settings.layout.profile_file()),
    })
}

/// Periodically drop sessions idle longer than `max_age`.
pub fn spawn_sweeper(
    orchestrators: Vec<Arc<Orchestrator>>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            for orchestrator in &orchestrators {
                let removed = orchestrator.sweep(max_age).await;
                if removed > 0 {
                    info!(mode = orchestrator.mode().name(), removed, "Swept idle sessions");
                }
            }
        }
    })
}

/// Start the server and run until Ctrl-C.
pub async fn start_server(settings: Settings) -> Result<()> {
    let client = Arc::new(settings.gemini.client());
    let state = assemble(&settings, Arc::clone(&client) as Arc<dyn ChatModel>, client)?;

    let mut swept = vec![Arc::clone(&state.chat)];
    swept.extend(state.chatbot.iter().cloned());
    let sweeper = spawn_sweeper(swept, settings.sweep_interval, settings.session_max_age);

    let app = build_router(&state);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr()))?;
    let addr = listener.local_addr()?;

    write_server_files(&settings.layout, addr.port())?;
    info!(
        %addr,
        chatbot = state.chatbot.is_some(),
        model = %settings.gemini.model,
        profile = %state.profiles.path().display(),
        "ApplyX server listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    sweeper.abort();
    remove_server_files(&settings.layout);
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

fn write_server_files(layout: &DataLayout, port: u16) -> Result<()> {
    std::fs::create_dir_all(layout.root())
        .with_context(|| format!("Failed to create {}", layout.root().display()))?;
    std::fs::write(layout.pid_file(), std::process::id().to_string())?;
    std::fs::write(layout.port_file(), port.to_string())?;
    Ok(())
}

fn remove_server_files(layout: &DataLayout) {
    let _ = std::fs::remove_file(layout.pid_file());
    let _ = std::fs::remove_file(layout.port_file());
}

/// Port of a running server for this data directory, if there is one.
pub fn get_server_port(layout: &DataLayout) -> Option<u16> {
    let pid: u32 = std::fs::read_to_string(layout.pid_file())
        .ok()?
        .trim()
        .parse()
        .ok()?;

    #[cfg(unix)]
    {
        use std::process::Command;
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .is_ok_and(|o| o.status.success());
        if !alive {
            return None;
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    std::fs::read_to_string(layout.port_file())
        .ok()?
        .trim()
        .parse()
        .ok()
}
