//! Data models for applyx entities.

mod chunk;
mod message;
mod profile;
mod session;

pub use chunk::{Chunk, ChunkKind};
pub use message::{Role, Turn};
pub use profile::Profile;
pub use session::{Session, SessionSummary};
