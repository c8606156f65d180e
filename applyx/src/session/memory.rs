//! In-memory session store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::store::SessionStore;
use crate::error::{ChatError, Result};
use crate::models::{Session, SessionSummary, Turn};

/// Sessions held in a process-local map. Lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Generate a UUIDv7 (time-ordered, globally unique).
fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, id: Option<String>) -> Result<String> {
        let id = id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(generate_id);

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            info!(session_id = %id, "Reusing existing session");
        } else {
            sessions.insert(id.clone(), Session::new(id.clone()));
            info!(session_id = %id, "Created session");
        }
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Session> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ChatError::session_not_found(id))
    }

    async fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .read()
            .await
            .values()
            .map(Session::summary)
            .collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        summaries
    }

    async fn delete(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Deleted session");
        }
        removed
    }

    async fn sweep(&self, max_age: Duration) -> Vec<String> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|session| session.is_expired(now, max_age))
            .map(|session| session.id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        if !expired.is_empty() {
            info!(removed = expired.len(), "Swept idle sessions");
        }
        expired
    }

    async fn record_exchange(
        &self,
        id: &str,
        generation: Uuid,
        user: Turn,
        assistant: Turn,
    ) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .filter(|session| session.generation == generation)
            .ok_or_else(|| ChatError::session_not_found(id))?;
        session.record_exchange(user, assistant);
        Ok(session.clone())
    }

    async fn set_result(&self, id: &str, result: String) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| ChatError::session_not_found(id))?;
        session.result = Some(result);
        Ok(())
    }

    async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }
}
