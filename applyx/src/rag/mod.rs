//! Document indexing and retrieval for grounded answers.

mod builder;
mod index;
mod loader;
mod retriever;
mod splitter;

pub use builder::IndexBuilder;
pub use index::VectorIndex;
pub use retriever::{Retriever, DEFAULT_TOP_K};
pub use splitter::TextSplitter;
