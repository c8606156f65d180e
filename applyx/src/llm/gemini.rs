//! Gemini REST client for text generation and embeddings.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::traits::{ChatModel, EmbedTask, Embedder, Prompt};
use crate::error::{ChatError, Result};
use crate::models::Role;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";

/// `batchEmbedContents` accepts at most this many requests per call.
const MAX_EMBED_BATCH: usize = 100;

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/{}:{method}", self.base_url, model_path(model))
    }

    fn build_generate_body(&self, prompt: &Prompt) -> Value {
        let contents: Vec<Value> = prompt
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": gemini_role(m.role),
                    "parts": [{ "text": m.text }],
                })
            })
            .collect();

        let mut body = json!({ "contents": contents });

        if let Some(ref system) = prompt.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        if let Some(temperature) = self.temperature {
            body["generationConfig"] = json!({ "temperature": temperature });
        }

        body
    }

    fn build_embed_body(&self, texts: &[String], task: EmbedTask) -> Value {
        let model = model_path(&self.embedding_model);
        let task_type = match task {
            EmbedTask::Document => "RETRIEVAL_DOCUMENT",
            EmbedTask::Query => "RETRIEVAL_QUERY",
        };
        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": model,
                    "content": { "parts": [{ "text": text }] },
                    "taskType": task_type,
                })
            })
            .collect();
        json!({ "requests": requests })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ChatError::Upstream(format!("Gemini API error ({status}): {text}")));
        }

        Ok(text)
    }
}

/// Gemini calls the assistant role `model`.
const fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    values: Vec<f32>,
}

/// Pull the reply text out of a `generateContent` response body.
fn parse_generate_response(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ChatError::Upstream(format!("Failed to parse Gemini response: {e}")))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ChatError::EmptyResponse(format!("prompt blocked: {reason}")));
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(ChatError::EmptyResponse("no candidates returned".to_string()));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(ChatError::EmptyResponse(format!("finish_reason: {reason}")));
    }

    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let url = self.endpoint(&self.model, "generateContent");
        let body = self.build_generate_body(prompt);

        debug!(model = %self.model, messages = prompt.messages.len(), "Calling Gemini generateContent");
        let text = self.post(&url, &body).await?;

        parse_generate_response(&text).inspect_err(|e| {
            warn!(model = %self.model, error = %e, "Gemini returned no usable text");
        })
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed(&self, texts: &[String], task: EmbedTask) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint(&self.embedding_model, "batchEmbedContents");
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_EMBED_BATCH) {
            let body = self.build_embed_body(batch, task);
            debug!(model = %self.embedding_model, batch = batch.len(), "Calling Gemini batchEmbedContents");
            let text = self.post(&url, &body).await?;
            let response: BatchEmbedResponse = serde_json::from_str(&text)?;

            if response.embeddings.len() != batch.len() {
                return Err(ChatError::Upstream(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(vectors)
    }
}
