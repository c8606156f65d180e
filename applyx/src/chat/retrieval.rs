//! Prompts for the retrieval-augmented path.

use crate::llm::{Prompt, PromptMessage};
use crate::models::{Chunk, Turn};

/// Turns a follow-up into a question that stands on its own.
pub const REWRITE_INSTRUCTION: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which \
can be understood without the chat history. Do NOT answer the question, just reformulate \
it if needed and otherwise return it as is.";

/// Sentence the model must reply with when the context lacks the answer.
pub const NOT_FOUND_ANSWER: &str = "Tôi không tìm thấy thông tin này trong tài liệu được cung cấp.";

const ANSWER_INSTRUCTION: &str = "Bạn là một trợ lý tư vấn tuyển sinh chuyên nghiệp và thân thiện \
của trường đại học.\nHãy trả lời câu hỏi của người dùng một cách chi tiết và chính xác nhất có thể.\n\
Bạn CHỈ được trả lời dựa vào Context. Nếu Context không có thông tin, TRẢ LỜI NGAY:\n\"";

const ANSWER_INSTRUCTION_TAIL: &str =
    "\"\nKhông được sử dụng kiến thức nền hoặc suy đoán.\nContext:\n";

fn with_history(history: &[Turn], question: &str) -> Vec<PromptMessage> {
    let mut messages: Vec<PromptMessage> = history.iter().map(PromptMessage::from).collect();
    messages.push(PromptMessage::user(question));
    messages
}

pub fn rewrite_prompt(history: &[Turn], question: &str) -> Prompt {
    Prompt {
        system: Some(REWRITE_INSTRUCTION.to_string()),
        messages: with_history(history, question),
    }
}

/// Chunks rendered with their source and page, separated by blank lines.
pub fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(Chunk::to_context)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn answer_prompt(chunks: &[Chunk], history: &[Turn], question: &str) -> Prompt {
    let system = format!(
        "{ANSWER_INSTRUCTION}{NOT_FOUND_ANSWER}{ANSWER_INSTRUCTION_TAIL}{}",
        format_context(chunks)
    );
    Prompt {
        system: Some(system),
        messages: with_history(history, question),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkKind, Role};

    fn chunk(source: &str, page: usize, content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            source: source.to_string(),
            page,
            kind: ChunkKind::Pdf,
        }
    }

    #[test]
    fn context_joins_annotated_chunks() {
        let context = format_context(&[chunk("a.pdf", 1, "one"), chunk("b.pdf", 4, "two")]);
        assert_eq!(context, "Nguồn: a.pdf | Trang: 1\none\n\nNguồn: b.pdf | Trang: 4\ntwo");
    }

    #[test]
    fn answer_prompt_grounds_and_quotes_refusal() {
        let history = vec![Turn::user("Ngành CNTT?"), Turn::assistant("Có.")];
        let prompt = answer_prompt(&[chunk("a.pdf", 2, "Học phí 40 triệu")], &history, "Học phí?");

        let system = prompt.system.unwrap();
        assert!(system.contains(&format!("\"{NOT_FOUND_ANSWER}\"")));
        assert!(system.ends_with("Context:\nNguồn: a.pdf | Trang: 2\nHọc phí 40 triệu"));
        assert_eq!(prompt.messages.len(), 3);
        assert_eq!(prompt.messages[1].role, Role::Assistant);
        assert_eq!(prompt.messages[2].text, "Học phí?");
    }

    #[test]
    fn rewrite_prompt_never_asks_for_an_answer() {
        let prompt = rewrite_prompt(&[Turn::user("x"), Turn::assistant("y")], "còn học phí?");
        assert!(prompt.system.as_deref().unwrap().contains("Do NOT answer"));
        assert_eq!(prompt.last_user_text(), Some("còn học phí?"));
    }
}
