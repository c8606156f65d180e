//! Deterministic model doubles for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{ChatModel, EmbedTask, Embedder, Prompt};
use crate::error::Result;

type Responder = Box<dyn Fn(&Prompt) -> Result<String> + Send + Sync>;

/// A chat model whose replies come from a closure. Every prompt is recorded.
pub struct ScriptedModel {
    responder: Responder,
    delay: Option<Duration>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    pub fn new(responder: impl Fn(&Prompt) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Echo the last user message back, prefixed.
    pub fn echo() -> Self {
        Self::new(|prompt| Ok(format!("echo: {}", prompt.last_user_text().unwrap_or_default())))
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(prompt)
    }
}

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// `DIMS` buckets, so texts sharing words score high on cosine similarity.
pub struct HashEmbedder;

const DIMS: usize = 64;

impl HashEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMS];
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            #[allow(clippy::cast_possible_truncation)]
            let bucket = (hasher.finish() % DIMS as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String], _task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}
