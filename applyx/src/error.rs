//! Error type shared by the chat, retrieval and persistence layers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    /// Unknown session, or missing profile/result file.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The model answered without any usable text. The payload is the
    /// reason, kept for logs.
    #[error("Không có phản hồi hợp lệ từ ApplyX. Vui lòng thử lại với nội dung khác.")]
    EmptyResponse(String),

    /// A persisted file exists but does not hold valid data.
    #[error("Dữ liệu hỏng trong {path}: {message}")]
    CorruptData { path: String, message: String },

    #[error("ApplyX không phản hồi sau {0} giây")]
    Timeout(u64),

    #[error("Lỗi dịch vụ mô hình: {0}")]
    Upstream(String),

    #[error("Lỗi IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lỗi HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Lỗi JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    pub fn session_not_found(id: &str) -> Self {
        Self::NotFound(format!("Session {id} không tồn tại"))
    }

    pub fn corrupt(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptData {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Coarse classification used by the HTTP boundary.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::EmptyResponse(_) => ErrorKind::EmptyResponse,
            Self::CorruptData { .. } => ErrorKind::CorruptData,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Upstream(_) | Self::Io(_) | Self::Http(_) | Self::Json(_) => ErrorKind::Upstream,
        }
    }
}

/// Error kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    EmptyResponse,
    CorruptData,
    Timeout,
    Upstream,
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_classify_as_upstream() {
        let err: ChatError = std::io::Error::other("disk full").into();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn not_found_message_is_verbatim() {
        let err = ChatError::session_not_found("abc");
        assert_eq!(err.to_string(), "Session abc không tồn tại");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn empty_response_hides_the_reason_from_users() {
        let err = ChatError::EmptyResponse("finish_reason: SAFETY".to_string());
        assert!(!err.to_string().contains("SAFETY"));
        assert!(err.to_string().starts_with("Không có phản hồi hợp lệ"));
    }
}
