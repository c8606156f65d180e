//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// ApplyX - admissions counseling chatbot backend
#[derive(Parser, Debug)]
#[command(name = "applyx")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (APPLYX_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the profile, saved results and the index
    #[arg(long, env = "APPLYX_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Gemini connection options shared by commands that call the model.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat model name
    #[arg(long, env = "APPLYX_MODEL", default_value = crate::llm::DEFAULT_CHAT_MODEL)]
    pub model: String,

    /// Embedding model name
    #[arg(long, env = "APPLYX_EMBEDDING_MODEL", default_value = crate::llm::DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Gemini API base URL
    #[arg(long, env = "GEMINI_BASE_URL", default_value = crate::llm::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, env = "APPLYX_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, env = "APPLYX_PORT", default_value = "8000")]
        port: u16,

        #[command(flatten)]
        model: ModelArgs,

        /// Give up on a model call after this many seconds
        #[arg(long, default_value = "60")]
        model_timeout_secs: u64,

        /// Drop sessions idle for longer than this
        #[arg(long, default_value = "24")]
        session_max_age_hours: u64,

        /// How often to look for idle sessions
        #[arg(long, default_value = "600")]
        sweep_interval_secs: u64,

        /// Retrieval index directory (default: <data-dir>/index)
        #[arg(long)]
        index_dir: Option<PathBuf>,

        /// Chunks retrieved per question
        #[arg(long, default_value = "5")]
        top_k: usize,

        /// Seed preamble JSON replacing the built-in survey
        #[arg(long)]
        seed_file: Option<PathBuf>,
    },

    /// Build the retrieval index from a directory of PDF and JSON files
    Index {
        /// Directory with the source documents
        docs_dir: PathBuf,

        /// Where to write index.json (default: <data-dir>/index)
        #[arg(long)]
        index_dir: Option<PathBuf>,

        /// Characters per chunk
        #[arg(long, default_value = "1000")]
        chunk_size: usize,

        /// Characters shared by neighbouring chunks
        #[arg(long, default_value = "100")]
        chunk_overlap: usize,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Send one message to a running server
    Ask {
        /// Continue this session instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,

        /// Ask the document-grounded chatbot instead of the survey chat
        #[arg(long)]
        chatbot: bool,

        /// Server URL (default: the running server for this data directory)
        #[arg(long, env = "APPLYX_URL")]
        url: Option<String>,

        /// Message to send
        #[arg(trailing_var_arg = true, required = true)]
        message: Vec<String>,
    },
}
