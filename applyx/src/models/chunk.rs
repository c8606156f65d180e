//! Indexed document chunk for the retrieval path.

use serde::{Deserialize, Serialize};

/// Where a chunk's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// A page of a PDF document.
    Pdf,
    /// A record of a JSON document.
    Json,
}

impl ChunkKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A window of document text with its source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content of the window.
    pub content: String,
    /// Source file name.
    pub source: String,
    /// 1-based page for PDFs, record index for JSON.
    pub page: usize,
    pub kind: ChunkKind,
}

impl Chunk {
    /// Render the chunk the way it is placed into a grounding context.
    pub fn to_context(&self) -> String {
        format!("Nguồn: {} | Trang: {}\n{}", self.source, self.page, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_line_carries_source_and_page() {
        let chunk = Chunk {
            content: "Điểm chuẩn ngành CNTT là 27.5".to_string(),
            source: "tuyensinh.pdf".to_string(),
            page: 3,
            kind: ChunkKind::Pdf,
        };
        assert_eq!(
            chunk.to_context(),
            "Nguồn: tuyensinh.pdf | Trang: 3\nĐiểm chuẩn ngành CNTT là 27.5"
        );
    }
}
