//! Session store trait — per-session state behind an injected abstraction.
//!
//! A session owns a debugging conversation: its history, its uploaded
//! telemetry events, and a private semantic index over those events. The
//! store is injected into the workflow invocation path so it can be swapped
//! for a persistent implementation without touching pipeline logic.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::index::SemanticIndex;
use crate::message::{ChatMessage, SessionId};
use crate::telemetry::TelemetryEvent;

/// A debugging session. Snapshots returned by the store are clones; all
/// mutation goes through the store's append operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID
    pub id: SessionId,

    /// Owning user
    pub user_id: String,

    /// When this session was created
    pub created_at: DateTime<Utc>,

    /// Ordered conversation history
    #[serde(default)]
    pub history: Vec<ChatMessage>,

    /// Ordered raw event records, in upload order
    #[serde(default)]
    pub events: Vec<TelemetryEvent>,

    /// Dedup keys of stored events, for O(1) duplicate rejection
    #[serde(skip)]
    pub event_keys: HashSet<String>,
}

impl Session {
    /// Create a fresh session for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            user_id: user_id.into(),
            created_at: Utc::now(),
            history: Vec::new(),
            events: Vec::new(),
            event_keys: HashSet::new(),
        }
    }
}

/// Outcome of a batch event upload.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UploadStats {
    /// Events stored and indexed
    pub added: usize,
    /// Events rejected as duplicates
    pub duplicates: usize,
}

/// The session store trait.
///
/// Mutation is append-only: messages and events are added, never edited.
/// Implementations must serialize concurrent mutation of a single session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new session for the given user.
    async fn create(&self, user_id: &str) -> std::result::Result<Session, SessionError>;

    /// Fetch a snapshot of a session.
    async fn get(&self, id: &SessionId) -> std::result::Result<Session, SessionError>;

    /// Delete a session and its event index. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> std::result::Result<bool, SessionError>;

    /// The session's conversation history, oldest first.
    async fn conversation_history(
        &self,
        id: &SessionId,
    ) -> std::result::Result<Vec<ChatMessage>, SessionError>;

    /// Append one message to the session's history.
    async fn add_message(
        &self,
        id: &SessionId,
        message: ChatMessage,
    ) -> std::result::Result<(), SessionError>;

    /// Append a batch of events, deduplicating by [`TelemetryEvent::dedup_key`].
    /// New events are rendered and added to the session's event index.
    async fn add_events(
        &self,
        id: &SessionId,
        events: Vec<TelemetryEvent>,
    ) -> std::result::Result<UploadStats, SessionError>;

    /// The session's private event index.
    async fn event_index(
        &self,
        id: &SessionId,
    ) -> std::result::Result<Arc<dyn SemanticIndex>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty() {
        let session = Session::new("user-1");
        assert_eq!(session.user_id, "user-1");
        assert!(session.history.is_empty());
        assert!(session.events.is_empty());
        assert!(session.event_keys.is_empty());
    }

    #[test]
    fn session_serialization_skips_dedup_keys() {
        let mut session = Session::new("user-1");
        session.event_keys.insert("k1".into());
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("event_keys"));

        let back: Session = serde_json::from_str(&json).unwrap();
        assert!(back.event_keys.is_empty());
    }
}
