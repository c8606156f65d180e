//! Session storage interface.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Session, SessionSummary, Turn};

/// Storage for conversation sessions.
///
/// Implementations must not hold internal locks across awaits of other
/// services, so requests for different sessions never wait on each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session and return its id. A supplied id that already
    /// exists is reused as-is.
    async fn create(&self, id: Option<String>) -> Result<String>;

    /// Snapshot of a session. `NotFound` if absent.
    async fn get(&self, id: &str) -> Result<Session>;

    /// Summaries of all sessions, oldest first.
    async fn list(&self) -> Vec<SessionSummary>;

    /// Remove a session. Returns false if it did not exist.
    async fn delete(&self, id: &str) -> bool;

    /// Remove sessions idle longer than `max_age`, returning their ids.
    async fn sweep(&self, max_age: Duration) -> Vec<String>;

    /// Append one completed exchange to the session `generation` names.
    /// `NotFound` if that session is gone, even when a newer session now
    /// holds the same id.
    async fn record_exchange(
        &self,
        id: &str,
        generation: Uuid,
        user: Turn,
        assistant: Turn,
    ) -> Result<Session>;

    /// Attach a saved result to the session.
    async fn set_result(&self, id: &str, result: String) -> Result<()>;

    async fn contains(&self, id: &str) -> bool {
        self.get(id).await.is_ok()
    }
}
