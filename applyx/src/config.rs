//! Runtime settings.
//!
//! Values come from the command line, which falls back to environment
//! variables (a `.env` file in the working directory is loaded first).
//! Everything persisted lives under one data directory, `~/.applyx` unless
//! overridden.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::chat::DEFAULT_MODEL_TIMEOUT;
use crate::llm::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
use crate::rag::DEFAULT_TOP_K;

const DATA_DIR: &str = ".applyx";

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Load `.env` from the working directory. Runs before argument parsing so
/// its values feed clap's env fallbacks, which is also before logging is up;
/// the caller reports the outcome.
pub fn load_dotenv() -> std::result::Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// The data directory: the explicit override, or `~/.applyx`.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => {
            let home = dirs::home_dir().context("Could not find home directory")?;
            Ok(home.join(DATA_DIR))
        }
    }
}

/// Fixed layout under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn profile_file(&self) -> PathBuf {
        self.root.join("profile").join("profile.json")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.root.join("server.pid")
    }

    pub fn port_file(&self) -> PathBuf {
        self.root.join("server.port")
    }
}

/// Connection settings for the Gemini API.
#[derive(Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl GeminiSettings {
    /// Settings with the default models. An empty key is rejected.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .context("GEMINI_API_KEY is not set. Put it in the environment or a .env file.")?;
        Ok(Self {
            api_key,
            model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
        })
    }

    pub fn client(&self) -> GeminiClient {
        let client = GeminiClient::new(self.api_key.clone())
            .with_model(self.model.clone())
            .with_embedding_model(self.embedding_model.clone())
            .with_base_url(self.base_url.clone());
        match self.temperature {
            Some(t) => client.with_temperature(t),
            None => client,
        }
    }
}

/// Everything `serve` needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub layout: DataLayout,
    pub gemini: GeminiSettings,
    pub model_timeout: Duration,
    pub session_max_age: Duration,
    pub sweep_interval: Duration,
    /// Where the retrieval index is read from. Defaults to `<data-dir>/index`.
    pub index_dir: PathBuf,
    pub top_k: usize,
    /// Replaces the built-in seed preamble when set.
    pub seed_file: Option<PathBuf>,
}

impl Settings {
    pub fn new(layout: DataLayout, gemini: GeminiSettings) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            index_dir: layout.index_dir(),
            layout,
            gemini,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            session_max_age: DEFAULT_SESSION_MAX_AGE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            top_k: DEFAULT_TOP_K,
            seed_file: None,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
