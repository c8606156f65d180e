//! Session model representing one ongoing conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Turn;

/// A conversation held by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier.
    pub id: String,
    /// Unique per created session. An id deleted and created again gets a
    /// new generation, so work started against the old session can tell.
    pub generation: Uuid,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the last exchange completed (or creation time).
    pub last_activity: DateTime<Utc>,
    /// Number of completed user/assistant exchanges.
    pub message_count: u64,
    /// Conversation turns in insertion order. Seed turns are not stored here.
    pub turns: Vec<Turn>,
    /// Most recently saved survey result.
    pub result: Option<String>,
}

impl Session {
    /// Create an empty session.
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            generation: Uuid::now_v7(),
            created_at: now,
            last_activity: now,
            message_count: 0,
            turns: Vec::new(),
            result: None,
        }
    }

    /// Append one exchange and bump the activity counters.
    pub fn record_exchange(&mut self, user: Turn, assistant: Turn) {
        self.last_activity = assistant.created_at;
        self.turns.push(user);
        self.turns.push(assistant);
        self.message_count += 1;
    }

    /// Whether the session has been idle longer than `max_age`.
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: std::time::Duration) -> bool {
        if max_age.is_zero() {
            return true;
        }
        let idle = now.signed_duration_since(self.last_activity);
        // A max age beyond chrono's range never expires.
        chrono::Duration::from_std(max_age).is_ok_and(|max| idle > max)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            message_count: self.message_count,
        }
    }
}

/// Session info returned by the listing and info endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
}
