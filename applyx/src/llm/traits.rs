use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Role, Turn};

/// One message sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub text: String,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

impl From<&Turn> for PromptMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            text: turn.content.clone(),
        }
    }
}

/// A full model request: optional system instruction plus the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    pub fn push(&mut self, message: PromptMessage) {
        self.messages.push(message);
    }

    /// Text of the final user message, if the prompt ends with one.
    #[cfg(test)]
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::User)
            .map(|m| m.text.as_str())
    }
}

/// A generative chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the next assistant message for `prompt`.
    ///
    /// Implementations return `EmptyResponse` when the provider answers
    /// without text (blocked, filtered, no candidates).
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// How an embedding will be used; providers tune vectors per task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTask {
    Document,
    Query,
}

/// A text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()], EmbedTask::Query).await?;
        vectors.pop().ok_or_else(|| {
            crate::error::ChatError::Upstream("embedding response was empty".to_string())
        })
    }
}
