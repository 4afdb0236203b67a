//! In-memory session store.
//!
//! Sessions live for the process lifetime: no persistence, destroyed on
//! explicit delete or restart. Each session owns a private in-memory event
//! index; uploaded events are rendered and indexed at upload time so chat
//! retrieval never touches raw payloads.
//!
//! All mutation goes through this store and is serialized behind its lock,
//! so truly concurrent requests against the same session stay safe without
//! any cooperation from the HTTP layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use tracepilot_core::error::SessionError;
use tracepilot_core::index::{EntryMetadata, IndexEntry, SemanticIndex};
use tracepilot_core::message::{ChatMessage, SessionId};
use tracepilot_core::session::{Session, SessionStore, UploadStats};
use tracepilot_core::telemetry::TelemetryEvent;
use tracepilot_index::{EmbeddingBackend, InMemoryIndex};

/// A session plus its private event index.
struct SessionSlot {
    session: Session,
    index: Arc<InMemoryIndex>,
}

/// The in-memory [`SessionStore`] implementation.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
    embedder: Option<EmbeddingBackend>,
}

impl InMemorySessionStore {
    /// A store whose event indexes are keyword-only.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            embedder: None,
        }
    }

    /// A store whose event indexes embed entries through the given backend.
    pub fn with_embedder(embedder: EmbeddingBackend) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            embedder: Some(embedder),
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: &str) -> Result<Session, SessionError> {
        let session = Session::new(user_id);
        let index_name = format!("events:{}", session.id);
        let index = match &self.embedder {
            Some(embedder) => {
                Arc::new(InMemoryIndex::with_embedder(index_name, embedder.clone()))
            }
            None => Arc::new(InMemoryIndex::new(index_name)),
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session.id.clone(),
            SessionSlot {
                session: session.clone(),
                index,
            },
        );
        info!(session_id = %session.id, user_id, "Session created");
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(|slot| slot.session.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Session deleted");
        }
        Ok(removed)
    }

    async fn conversation_history(
        &self,
        id: &SessionId,
    ) -> Result<Vec<ChatMessage>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(|slot| slot.session.history.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    async fn add_message(
        &self,
        id: &SessionId,
        message: ChatMessage,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        slot.session.history.push(message);
        Ok(())
    }

    async fn add_events(
        &self,
        id: &SessionId,
        events: Vec<TelemetryEvent>,
    ) -> Result<UploadStats, SessionError> {
        // The write guard is held across indexing on purpose: uploads to one
        // session are serialized, and dedup keys stay consistent with the
        // index contents.
        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let mut stats = UploadStats::default();
        let mut entries = Vec::new();

        for event in events {
            let key = event.dedup_key();
            if !slot.session.event_keys.insert(key.clone()) {
                stats.duplicates += 1;
                continue;
            }
            entries.push(IndexEntry {
                id: key,
                content: event.render(),
                metadata: EntryMetadata {
                    is_error: event.is_error(),
                    category: Some(event.category()),
                    timestamp: Some(event.timestamp),
                    ..Default::default()
                },
                created_at: Utc::now(),
                score: 0.0,
                embedding: None,
            });
            slot.session.events.push(event);
            stats.added += 1;
        }

        if !entries.is_empty() {
            slot.index
                .add(entries)
                .await
                .map_err(|e| SessionError::Storage(e.to_string()))?;
        }

        debug!(
            session_id = %id,
            added = stats.added,
            duplicates = stats.duplicates,
            "Events uploaded"
        );
        Ok(stats)
    }

    async fn event_index(
        &self,
        id: &SessionId,
    ) -> Result<Arc<dyn SemanticIndex>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(|slot| slot.index.clone() as Arc<dyn SemanticIndex>)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }
}
