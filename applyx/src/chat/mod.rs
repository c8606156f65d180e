//! Conversation orchestration for the plain and retrieval chat paths.

mod orchestrator;
pub mod retrieval;

pub use orchestrator::{ChatMode, Orchestrator, DEFAULT_MODEL_TIMEOUT};
