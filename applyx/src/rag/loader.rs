//! Source document loading for index builds.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ChatError, Result};
use crate::models::ChunkKind;

/// One page (PDF) or record (JSON) of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source: String,
    pub page: usize,
    pub kind: ChunkKind,
    pub text: String,
}

/// Load every `.pdf` and `.json` file directly inside `dir`, in name order.
pub fn load_documents(dir: &Path) -> Result<Vec<SourceDocument>> {
    if !dir.is_dir() {
        return Err(ChatError::NotFound(format!(
            "Document directory {} does not exist",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut documents = Vec::new();

    for path in files {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let loaded = match extension.as_deref() {
            Some("pdf") => load_pdf(&path),
            Some("json") => load_json(&path),
            _ => continue,
        };
        match loaded {
            Ok(docs) => {
                info!(file = %path.display(), pages = docs.len(), "Loaded document");
                documents.extend(docs);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable document"),
        }
    }

    Ok(documents)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn load_pdf(path: &Path) -> Result<Vec<SourceDocument>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| ChatError::corrupt(path.display().to_string(), e.to_string()))?;
    let source = file_name(path);

    Ok(pages
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = clean_text(raw);
            (!text.is_empty()).then(|| SourceDocument {
                source: source.clone(),
                page: i + 1,
                kind: ChunkKind::Pdf,
                text,
            })
        })
        .collect())
}

fn load_json(path: &Path) -> Result<Vec<SourceDocument>> {
    let raw = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| ChatError::corrupt(path.display().to_string(), e.to_string()))?;
    Ok(json_documents(&file_name(path), value))
}

/// A top-level array yields one record per element; anything else is a
/// single record.
fn json_documents(source: &str, value: Value) -> Vec<SourceDocument> {
    let records = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| {
            let text = clean_text(&record_text(&record));
            (!text.is_empty()).then(|| SourceDocument {
                source: source.to_string(),
                page: i + 1,
                kind: ChunkKind::Json,
                text,
            })
        })
        .collect()
}

/// Objects become `key: value` lines so the text reads naturally to the model.
fn record_text(record: &Value) -> String {
    match record {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}: {s}"),
                other => format!("{key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

static RUNS_OF_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("space pattern is valid"));
static BLANK_LINE_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\s*\n\s*(\n\s*)+").expect("blank line pattern is valid")
});

/// Normalizes whitespace left behind by PDF extraction.
fn clean_text(text: &str) -> String {
    let text = RUNS_OF_SPACES.replace_all(text, " ");
    let text = BLANK_LINE_RUNS.replace_all(&text, "\n\n");
    text.trim().to_string()
}
