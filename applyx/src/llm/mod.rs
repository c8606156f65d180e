//! Language model and embedding clients.

mod gemini;
#[cfg(test)]
pub mod scripted;
mod traits;

pub use gemini::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL};
pub use traits::{ChatModel, EmbedTask, Embedder, Prompt, PromptMessage};
