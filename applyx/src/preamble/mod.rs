//! Seed conversation used to prime every plain-chat session.
//!
//! The preamble is data: a versioned JSON document holding the scripted
//! survey questions, the result schema the model must emit, and the seed
//! turns template. Placeholders of the form `{{name}}` in turn text are
//! filled in when the document is loaded.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::error::{ChatError, Result};
use crate::llm::PromptMessage;
use crate::models::Role;

const BUILTIN_SEED: &str = include_str!("../../assets/ikigai_seed.json");

const OPTION_LETTERS: &[char] = &['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// Any `{{name}}` still present after substitution.
static LEFTOVER_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
}

impl Question {
    /// Render as `**Câu n:** text` followed by lettered options.
    pub fn render(&self, number: usize) -> String {
        let mut out = format!("**Câu {number}:** {}", self.text);
        for (letter, option) in OPTION_LETTERS.iter().zip(&self.options) {
            out.push('\n');
            out.push_str(&format!("{letter}) {option}"));
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SeedTurn {
    role: Role,
    text: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SeedDocument {
    version: String,
    start_phrase: String,
    #[serde(default)]
    adaptive_questions: usize,
    questions: Vec<Question>,
    result_schema: serde_json::Value,
    turns: Vec<SeedTurn>,
}

/// A loaded, rendered preamble.
#[derive(Debug, Clone)]
pub struct Preamble {
    version: String,
    start_phrase: String,
    questions: Vec<Question>,
    turns: Vec<PromptMessage>,
}

impl Preamble {
    /// The survey preamble compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_SEED, "builtin")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let preamble = Self::parse(&raw, &path.display().to_string())?;
        info!(path = %path.display(), "Loaded seed preamble");
        Ok(preamble)
    }

    /// Parse and render a seed document. `origin` names it in errors.
    pub fn parse(raw: &str, origin: &str) -> Result<Self> {
        let doc: SeedDocument =
            serde_json::from_str(raw).map_err(|e| ChatError::corrupt(origin, e.to_string()))?;

        if doc.turns.is_empty() {
            return Err(ChatError::corrupt(origin, "seed has no turns"));
        }

        let scripted = doc.questions.len();
        let questions_block = doc
            .questions
            .iter()
            .enumerate()
            .map(|(i, q)| q.render(i + 1))
            .collect::<Vec<_>>()
            .join("\n\n");
        let schema = serde_json::to_string_pretty(&doc.result_schema)?;

        let values = [
            ("questions", questions_block),
            ("result_schema", schema),
            ("scripted_count", scripted.to_string()),
            ("adaptive_count", doc.adaptive_questions.to_string()),
            ("total_questions", (scripted + doc.adaptive_questions).to_string()),
            ("first_adaptive", (scripted + 1).to_string()),
            ("start_phrase", doc.start_phrase.clone()),
        ];

        let mut turns = Vec::with_capacity(doc.turns.len());
        for turn in doc.turns {
            let mut text = turn.text;
            for (name, value) in &values {
                text = text.replace(&format!("{{{{{name}}}}}"), value);
            }
            if let Some(caps) = LEFTOVER_PLACEHOLDER.captures(&text) {
                return Err(ChatError::corrupt(
                    origin,
                    format!("unknown placeholder '{}'", &caps[1]),
                ));
            }
            turns.push(PromptMessage {
                role: turn.role,
                text,
            });
        }

        Ok(Self {
            version: doc.version,
            start_phrase: doc.start_phrase,
            questions: doc.questions,
            turns,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The user message that starts the survey.
    pub fn start_phrase(&self) -> &str {
        &self.start_phrase
    }

    /// Rendered seed turns, in order.
    pub fn turns(&self) -> &[PromptMessage] {
        &self.turns
    }

    /// Scripted question `number` (1-based), rendered as the model must ask it.
    #[cfg(test)]
    pub fn question(&self, number: usize) -> Option<String> {
        number
            .checked_sub(1)
            .and_then(|i| self.questions.get(i))
            .map(|q| q.render(number))
    }

    pub fn scripted_question_count(&self) -> usize {
        self.questions.len()
    }
}
