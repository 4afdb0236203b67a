//! Workflow orchestrator — an explicit state machine over the pipeline.
//!
//! ```text
//! start → ClassifyIntent → RetrieveContexts ─┬─→ FormatContexts → GenerateResponse → End
//!                                            └─→ AnalyzeErrors ──┘   (debug intent only)
//! ```
//!
//! The state is one typed record threaded through the nodes. Each node
//! reads the fields it declares and returns a partial [`StateUpdate`];
//! updates merge additively for the metadata map and by replacement for
//! everything else. No node mutates a sibling's fields directly.
//!
//! The orchestrator owns no long-lived resources beyond its injected
//! collaborators and is safe to invoke concurrently for different
//! sessions: each invocation's state is independent. There is no retry or
//! checkpointing — a failed turn is simply lost, and nothing is appended
//! to session history in that case.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use tracepilot_config::{AppConfig, BudgetConfig, RetrievalConfig};
use tracepilot_core::error::{Error, IndexError};
use tracepilot_core::event::{DomainEvent, EventBus};
use tracepilot_core::index::{IndexEntry, IndexQuery, SemanticIndex};
use tracepilot_core::intent::Intent;
use tracepilot_core::message::{ChatMessage, SessionId};
use tracepilot_core::model::LanguageModel;
use tracepilot_core::session::SessionStore;

use crate::formatter::format_context;
use crate::generator::{build_prompt, generate, DEFAULT_SYSTEM_PROMPT};
use crate::intent::classify_intent;
use crate::retriever;

// ── State ─────────────────────────────────────────────────────────────────

/// The single mutable record threaded through the pipeline. Created fresh
/// per chat invocation.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub session_id: SessionId,
    pub user_message: String,
    pub conversation_history: Vec<ChatMessage>,
    /// Assigned by `ClassifyIntent`; exactly one value before retrieval.
    pub intent: Option<Intent>,
    pub raw_events: Vec<IndexEntry>,
    pub raw_docs: Vec<IndexEntry>,
    pub formatted_event_context: String,
    pub formatted_knowledge_context: String,
    pub formatted_history_context: String,
    /// Populated by `AnalyzeErrors` on debug turns.
    pub error_events: Vec<IndexEntry>,
    pub tokens_used: usize,
    /// Merge-accumulated across nodes.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub response: Option<String>,
}

impl WorkflowState {
    /// Fresh state for one invocation.
    pub fn new(
        session_id: SessionId,
        user_message: impl Into<String>,
        conversation_history: Vec<ChatMessage>,
    ) -> Self {
        Self {
            session_id,
            user_message: user_message.into(),
            conversation_history,
            intent: None,
            raw_events: Vec::new(),
            raw_docs: Vec::new(),
            formatted_event_context: String::new(),
            formatted_knowledge_context: String::new(),
            formatted_history_context: String::new(),
            error_events: Vec::new(),
            tokens_used: 0,
            metadata: serde_json::Map::new(),
            response: None,
        }
    }

    /// Merge a node's partial update: metadata accumulates, everything else
    /// replaces when the node returned a value.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(intent) = update.intent {
            self.intent = Some(intent);
        }
        if let Some(events) = update.raw_events {
            self.raw_events = events;
        }
        if let Some(docs) = update.raw_docs {
            self.raw_docs = docs;
        }
        if let Some(text) = update.formatted_event_context {
            self.formatted_event_context = text;
        }
        if let Some(text) = update.formatted_knowledge_context {
            self.formatted_knowledge_context = text;
        }
        if let Some(text) = update.formatted_history_context {
            self.formatted_history_context = text;
        }
        if let Some(errors) = update.error_events {
            self.error_events = errors;
        }
        if let Some(tokens) = update.tokens_used {
            self.tokens_used = tokens;
        }
        if let Some(response) = update.response {
            self.response = Some(response);
        }
        for (key, value) in update.metadata {
            self.metadata.insert(key, value);
        }
    }
}

/// A node's partial update. Fields a node doesn't touch stay `None` and
/// leave the state untouched.
#[derive(Debug, Default)]
pub struct StateUpdate {
    pub intent: Option<Intent>,
    pub raw_events: Option<Vec<IndexEntry>>,
    pub raw_docs: Option<Vec<IndexEntry>>,
    pub formatted_event_context: Option<String>,
    pub formatted_knowledge_context: Option<String>,
    pub formatted_history_context: Option<String>,
    pub error_events: Option<Vec<IndexEntry>>,
    pub tokens_used: Option<usize>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub response: Option<String>,
}

// ── Transition table ──────────────────────────────────────────────────────

/// Pipeline nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowNode {
    ClassifyIntent,
    RetrieveContexts,
    AnalyzeErrors,
    FormatContexts,
    GenerateResponse,
    End,
}

/// The explicit transition table. The only branch: debug turns route
/// through `AnalyzeErrors` between retrieval and formatting.
pub fn next_node(current: WorkflowNode, state: &WorkflowState) -> WorkflowNode {
    match current {
        WorkflowNode::ClassifyIntent => WorkflowNode::RetrieveContexts,
        WorkflowNode::RetrieveContexts => {
            if state.intent == Some(Intent::Debug) {
                WorkflowNode::AnalyzeErrors
            } else {
                WorkflowNode::FormatContexts
            }
        }
        WorkflowNode::AnalyzeErrors => WorkflowNode::FormatContexts,
        WorkflowNode::FormatContexts => WorkflowNode::GenerateResponse,
        WorkflowNode::GenerateResponse => WorkflowNode::End,
        WorkflowNode::End => WorkflowNode::End,
    }
}

// ── Configuration ─────────────────────────────────────────────────────────

/// Everything the orchestrator needs to know besides its collaborators.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub budget: BudgetConfig,
    pub retrieval: RetrievalConfig,
    pub system_prompt: String,
}

impl WorkflowConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: config.default_max_tokens,
            budget: config.budget.clone(),
            retrieval: config.retrieval.clone(),
            system_prompt: config
                .system_prompt_override
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

// ── Caller-facing result ──────────────────────────────────────────────────

/// Metadata returned with every chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMetadata {
    pub intent: Intent,
    pub event_context_used: bool,
    pub knowledge_base_used: bool,
    pub tokens_used: usize,
    pub events_retrieved: usize,
    pub documents_retrieved: usize,
}

/// The caller-facing outcome of one chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub response: String,
    pub metadata: ChatMetadata,
}

// ── Orchestrator ──────────────────────────────────────────────────────────

/// Sequences the pipeline nodes over injected collaborators.
pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn SessionStore>,
    knowledge_base: Arc<dyn SemanticIndex>,
    event_bus: Arc<EventBus>,
    config: WorkflowConfig,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn SessionStore>,
        knowledge_base: Arc<dyn SemanticIndex>,
        event_bus: Arc<EventBus>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            model,
            store,
            knowledge_base,
            event_bus,
            config,
        }
    }

    /// The caller-facing chat operation.
    ///
    /// Session existence is the one precondition surfaced as an error;
    /// everything inside the workflow degrades gracefully. On success the
    /// user and assistant turns are appended to the session's history.
    pub async fn chat(
        &self,
        session_id: &SessionId,
        message: &str,
    ) -> Result<ChatOutcome, Error> {
        let session = self.store.get(session_id).await.map_err(Error::Session)?;

        let state = WorkflowState::new(session_id.clone(), message, session.history);
        let state = self.invoke(state).await;

        let response = state
            .response
            .clone()
            .unwrap_or_else(|| crate::generator::FALLBACK_RESPONSE.to_string());

        self.store
            .add_message(session_id, ChatMessage::user(message))
            .await
            .map_err(Error::Session)?;
        self.store
            .add_message(session_id, ChatMessage::assistant(&response))
            .await
            .map_err(Error::Session)?;

        let metadata = ChatMetadata {
            intent: state.intent.unwrap_or_default(),
            event_context_used: !state.formatted_event_context.is_empty(),
            knowledge_base_used: !state.formatted_knowledge_context.is_empty(),
            tokens_used: state.tokens_used,
            events_retrieved: state.raw_events.len(),
            documents_retrieved: state.raw_docs.len(),
        };

        info!(
            %session_id,
            intent = %metadata.intent,
            tokens_used = metadata.tokens_used,
            "Chat turn complete"
        );

        Ok(ChatOutcome { response, metadata })
    }

    /// Run the state machine to completion. Infallible by design: every
    /// node recovers its own failures.
    pub async fn invoke(&self, mut state: WorkflowState) -> WorkflowState {
        let mut node = WorkflowNode::ClassifyIntent;
        while node != WorkflowNode::End {
            let update = match node {
                WorkflowNode::ClassifyIntent => self.classify_node(&state).await,
                WorkflowNode::RetrieveContexts => self.retrieve_node(&state).await,
                WorkflowNode::AnalyzeErrors => self.analyze_errors_node(&state),
                WorkflowNode::FormatContexts => self.format_node(&state),
                WorkflowNode::GenerateResponse => self.generate_node(&state).await,
                WorkflowNode::End => StateUpdate::default(),
            };
            state.apply(update);
            node = next_node(node, &state);
        }
        state
    }

    // ── Nodes ─────────────────────────────────────────────────────────────
    // Each node reads a subset of the state and returns a partial update.

    async fn classify_node(&self, state: &WorkflowState) -> StateUpdate {
        let intent =
            classify_intent(self.model.as_ref(), &self.config.model, &state.user_message).await;

        self.event_bus.publish(DomainEvent::IntentClassified {
            session_id: state.session_id.to_string(),
            intent: intent.to_string(),
            timestamp: Utc::now(),
        });

        let mut update = StateUpdate {
            intent: Some(intent),
            ..Default::default()
        };
        update.metadata.insert("intent".into(), json!(intent));
        update
    }

    async fn retrieve_node(&self, state: &WorkflowState) -> StateUpdate {
        let intent = state.intent.unwrap_or_default();

        let context = match self.store.event_index(&state.session_id).await {
            Ok(index) => {
                retriever::retrieve(
                    index.as_ref(),
                    self.knowledge_base.as_ref(),
                    &self.config.retrieval,
                    intent,
                    &state.user_message,
                )
                .await
            }
            Err(e) => {
                // Session vanished mid-turn: the event side degrades like any
                // other retrieval failure, the knowledge side still runs.
                warn!(session_id = %state.session_id, error = %e, "Event index unavailable");
                let unavailable = UnavailableIndex(e.to_string());
                retriever::retrieve(
                    &unavailable,
                    self.knowledge_base.as_ref(),
                    &self.config.retrieval,
                    intent,
                    &state.user_message,
                )
                .await
            }
        };

        for (source, failure) in [
            ("events", &context.event_failure),
            ("knowledge_base", &context.knowledge_failure),
        ] {
            if let Some(error) = failure {
                self.event_bus.publish(DomainEvent::RetrievalFailed {
                    session_id: state.session_id.to_string(),
                    source: source.into(),
                    error: error.clone(),
                    timestamp: Utc::now(),
                });
            }
        }

        let mut update = StateUpdate::default();
        update
            .metadata
            .insert("events_retrieved".into(), json!(context.events.len()));
        update
            .metadata
            .insert("documents_retrieved".into(), json!(context.documents.len()));
        update.metadata.insert(
            "knowledge_base_queried".into(),
            json!(context.knowledge_queried),
        );
        update.raw_events = Some(context.events);
        update.raw_docs = Some(context.documents);
        update
    }

    fn analyze_errors_node(&self, state: &WorkflowState) -> StateUpdate {
        let errors: Vec<IndexEntry> = state
            .raw_events
            .iter()
            .filter(|e| e.metadata.is_error)
            .cloned()
            .collect();

        let mut update = StateUpdate::default();
        update
            .metadata
            .insert("error_event_count".into(), json!(errors.len()));
        update.error_events = Some(errors);
        update
    }

    fn format_node(&self, state: &WorkflowState) -> StateUpdate {
        let intent = state.intent.unwrap_or_default();
        let formatted = format_context(
            &state.raw_events,
            &state.raw_docs,
            &state.conversation_history,
            intent,
            &state.user_message,
            &self.config.budget,
            self.config.retrieval.document_k,
        );

        let mut update = StateUpdate::default();
        update.metadata.insert(
            "context_tokens".into(),
            json!({
                "available": formatted.available,
                "events": formatted.events.tokens,
                "documents": formatted.documents.tokens,
                "history": formatted.history.tokens,
            }),
        );
        update.metadata.insert(
            "events_included".into(),
            json!(formatted.events.included),
        );
        update.metadata.insert(
            "history_included".into(),
            json!(formatted.history.included),
        );
        update.formatted_event_context = Some(formatted.event_context);
        update.formatted_knowledge_context = Some(formatted.knowledge_context);
        update.formatted_history_context = Some(formatted.history_context);
        update
    }

    async fn generate_node(&self, state: &WorkflowState) -> StateUpdate {
        let intent = state.intent.unwrap_or_default();
        let error_count = (!state.error_events.is_empty()).then(|| state.error_events.len());

        let prompt = build_prompt(
            &self.config.system_prompt,
            &state.formatted_knowledge_context,
            &state.formatted_event_context,
            intent,
            error_count,
            &state.formatted_history_context,
            &state.user_message,
        );

        let generated = generate(
            self.model.as_ref(),
            &self.config.model,
            self.config.temperature,
            self.config.max_tokens,
            prompt,
        )
        .await;

        let tokens_used = generated
            .usage
            .as_ref()
            .map(|u| u.total_tokens as usize)
            .unwrap_or(generated.prompt_tokens);

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            session_id: state.session_id.to_string(),
            intent: intent.to_string(),
            tokens_used,
            fallback: generated.fallback,
            timestamp: Utc::now(),
        });

        let mut update = StateUpdate::default();
        update
            .metadata
            .insert("fallback_response".into(), json!(generated.fallback));
        update.tokens_used = Some(tokens_used);
        update.response = Some(generated.text);
        update
    }
}

/// Stand-in event index when the session disappeared mid-turn; every
/// search reports the stored failure so retrieval degrades uniformly.
struct UnavailableIndex(String);

#[async_trait]
impl SemanticIndex for UnavailableIndex {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn add(&self, _entries: Vec<IndexEntry>) -> Result<usize, IndexError> {
        Err(IndexError::Storage(self.0.clone()))
    }

    async fn search(&self, _query: IndexQuery) -> Result<Vec<IndexEntry>, IndexError> {
        Err(IndexError::QueryFailed(self.0.clone()))
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Err(IndexError::QueryFailed(self.0.clone()))
    }

    async fn clear(&self) -> Result<(), IndexError> {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
