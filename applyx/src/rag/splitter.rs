//! Recursive character text splitter.
//!
//! Text is cut on the coarsest separator that keeps pieces under
//! `chunk_size` characters (paragraphs, then lines, then words, then single
//! characters), and pieces are merged back into windows that overlap by at
//! most `chunk_overlap` characters. Lengths are counted in `char`s.

use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    /// Overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut out = Vec::new();
        let mut fitting = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if remaining.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split_with(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, separator));
        }
        out
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_window(&mut windows, &current, separator);

                // Drop from the front until what remains fits in the overlap.
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            current.push_back(piece);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        push_window(&mut windows, &current, separator);
        windows
    }
}

fn push_window(windows: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}
