//! HTTP API v1 — the REST surface over the workflow.
//!
//! Endpoints:
//!
//! - `POST   /v1/sessions`              — Create a debugging session
//! - `GET    /v1/sessions/{id}`         — Session summary
//! - `DELETE /v1/sessions/{id}`         — Delete a session
//! - `POST   /v1/sessions/{id}/events`  — Upload a telemetry batch
//! - `POST   /v1/chat`                  — Ask a question, get a response
//! - `POST   /v1/documents`             — Ingest a document into the knowledge base
//! - `GET    /v1/documents`             — Knowledge base stats
//! - `GET    /v1/events`                — SSE stream of pipeline events

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use tracepilot_core::error::{Error, SessionError};
use tracepilot_core::event::DomainEvent;
use tracepilot_core::index::SemanticIndex as _;
use tracepilot_core::message::SessionId;
use tracepilot_core::session::SessionStore as _;
use tracepilot_core::telemetry::TelemetryEvent;
use tracepilot_index::ingest_document;
use tracepilot_workflow::ChatMetadata;

use crate::SharedApiState;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{id}", get(get_session_handler))
        .route("/sessions/{id}", axum::routing::delete(delete_session_handler))
        .route("/sessions/{id}/events", post(upload_events_handler))
        .route("/chat", post(chat_handler))
        .route("/documents", post(ingest_document_handler))
        .route("/documents", get(documents_stats_handler))
        .route("/events", get(events_stream_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateSessionRequest {
    #[serde(default = "default_user")]
    user_id: String,
}

fn default_user() -> String {
    "anonymous".into()
}

#[derive(Serialize, Deserialize)]
struct SessionResponse {
    session_id: String,
    user_id: String,
    created_at: DateTime<Utc>,
    message_count: usize,
    event_count: usize,
}

#[derive(Deserialize)]
struct UploadEventsRequest {
    events: Vec<TelemetryEvent>,
}

#[derive(Serialize, Deserialize)]
struct UploadEventsResponse {
    added: usize,
    duplicates: usize,
}

#[derive(Deserialize)]
struct ChatRequest {
    session_id: String,
    message: String,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    response: String,
    metadata: ChatMetadata,
}

#[derive(Deserialize)]
struct IngestDocumentRequest {
    title: String,
    #[serde(default)]
    source: Option<String>,
    content: String,
}

#[derive(Serialize, Deserialize)]
struct IngestDocumentResponse {
    chunks: usize,
}

#[derive(Serialize, Deserialize)]
struct DocumentsStatsResponse {
    entries: usize,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn session_error(e: SessionError) -> ApiError {
    match &e {
        SessionError::NotFound(_) => error_response(StatusCode::NOT_FOUND, e.to_string()),
        _ => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn create_session_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state
        .store
        .create(&payload.user_id)
        .await
        .map_err(session_error)?;

    state.event_bus.publish(DomainEvent::SessionCreated {
        session_id: session.id.to_string(),
        timestamp: Utc::now(),
    });

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.id.to_string(),
            user_id: session.user_id,
            created_at: session.created_at,
            message_count: 0,
            event_count: 0,
        }),
    ))
}

async fn get_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .store
        .get(&SessionId::from(&id))
        .await
        .map_err(session_error)?;

    Ok(Json(SessionResponse {
        session_id: session.id.to_string(),
        user_id: session.user_id,
        created_at: session.created_at,
        message_count: session.history.len(),
        event_count: session.events.len(),
    }))
}

async fn delete_session_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .store
        .delete(&SessionId::from(&id))
        .await
        .map_err(session_error)?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Session not found: {id}"),
        ))
    }
}

async fn upload_events_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<UploadEventsRequest>,
) -> Result<Json<UploadEventsResponse>, ApiError> {
    let session_id = SessionId::from(&id);
    let stats = state
        .store
        .add_events(&session_id, payload.events)
        .await
        .map_err(session_error)?;

    state.event_bus.publish(DomainEvent::EventsUploaded {
        session_id: session_id.to_string(),
        added: stats.added,
        duplicates: stats.duplicates,
        timestamp: Utc::now(),
    });

    info!(%session_id, added = stats.added, duplicates = stats.duplicates, "Telemetry uploaded");
    Ok(Json(UploadEventsResponse {
        added: stats.added,
        duplicates: stats.duplicates,
    }))
}

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let session_id = SessionId::from(&payload.session_id);

    let outcome = state
        .orchestrator
        .chat(&session_id, &payload.message)
        .await
        .map_err(|e| match e {
            Error::Session(err) => session_error(err),
            other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        metadata: outcome.metadata,
    }))
}

async fn ingest_document_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<IngestDocumentRequest>,
) -> Result<(StatusCode, Json<IngestDocumentResponse>), ApiError> {
    let source = payload.source.unwrap_or_else(|| "api".into());
    let chunks = ingest_document(
        state.knowledge_base.as_ref(),
        &payload.title,
        &source,
        &payload.content,
        state.config.knowledge.chunk_tokens,
        state.config.knowledge.chunk_overlap_tokens,
    )
    .await
    .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    state.event_bus.publish(DomainEvent::DocumentsIngested {
        chunks,
        timestamp: Utc::now(),
    });

    Ok((StatusCode::CREATED, Json(IngestDocumentResponse { chunks })))
}

async fn documents_stats_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<DocumentsStatsResponse>, ApiError> {
    let entries = state
        .knowledge_base
        .count()
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(DocumentsStatsResponse { entries }))
}

/// `GET /v1/events` — live SSE stream of pipeline domain events.
async fn events_stream_handler(
    State(state): State<SharedApiState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_bus.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let event = result.ok()?;
        let data = serde_json::to_string(event.as_ref()).ok()?;
        Some(Ok(SseEvent::default().event("pipeline").data(data)))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_router, ApiState};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    use tracepilot_config::AppConfig;
    use tracepilot_core::error::ModelError;
    use tracepilot_core::event::EventBus;
    use tracepilot_core::model::{CompletionRequest, CompletionResponse, LanguageModel};
    use tracepilot_index::InMemoryIndex;
    use tracepilot_session::InMemorySessionStore;
    use tracepilot_workflow::{Orchestrator, WorkflowConfig};

    /// Answers every completion with the same text. The classifier can't
    /// parse it, so every turn lands on general intent.
    struct StubModel;

    #[async_trait]
    impl LanguageModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ModelError> {
            Ok(CompletionResponse {
                text: "Stub answer grounded in the session.".into(),
                usage: None,
                model: request.model,
            })
        }
    }

    fn test_state() -> SharedApiState {
        let config = AppConfig::default();
        let model = Arc::new(StubModel);
        let store = Arc::new(InMemorySessionStore::new());
        let knowledge_base = Arc::new(InMemoryIndex::new("knowledge_base"));
        let event_bus = Arc::new(EventBus::default());
        let orchestrator = Arc::new(Orchestrator::new(
            model,
            store.clone(),
            knowledge_base.clone(),
            event_bus.clone(),
            WorkflowConfig::from_app_config(&config),
        ));
        Arc::new(ApiState {
            store,
            knowledge_base,
            orchestrator,
            event_bus,
            config,
            start_time: Utc::now(),
        })
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_session(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/sessions", serde_json::json!({"user_id": "tester"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let session: SessionResponse = json_body(response).await;
        session.session_id
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let app = build_router(test_state());
        let id = create_session(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session: SessionResponse = json_body(response).await;
        assert_eq!(session.user_id, "tester");
        assert_eq!(session.event_count, 0);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/v1/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/sessions/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_events_with_dedup() {
        let app = build_router(test_state());
        let id = create_session(&app).await;

        let batch = serde_json::json!({
            "events": [
                {"eventId": "e1", "vendor": "v", "type": "edge",
                 "timestamp": "2026-08-01T00:00:00Z", "payload": {"status": 200}},
                {"eventId": "e2", "vendor": "v", "type": "edge",
                 "timestamp": "2026-08-01T00:00:01Z", "payload": {"status": 500}}
            ]
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", &format!("/v1/sessions/{id}/events"), batch.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let upload: UploadEventsResponse = json_body(response).await;
        assert_eq!(upload.added, 2);
        assert_eq!(upload.duplicates, 0);

        // Same batch again: everything is a duplicate.
        let response = app
            .clone()
            .oneshot(json_request("POST", &format!("/v1/sessions/{id}/events"), batch))
            .await
            .unwrap();
        let upload: UploadEventsResponse = json_body(response).await;
        assert_eq!(upload.added, 0);
        assert_eq!(upload.duplicates, 2);
    }

    #[tokio::test]
    async fn upload_to_missing_session_is_404() {
        let app = build_router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/sessions/nope/events",
                serde_json::json!({"events": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_happy_path() {
        let app = build_router(test_state());
        let id = create_session(&app).await;

        app.clone()
            .oneshot(json_request(
                "POST",
                &format!("/v1/sessions/{id}/events"),
                serde_json::json!({
                    "events": [{"eventId": "e1", "vendor": "v", "type": "edge",
                                "timestamp": "2026-08-01T00:00:00Z",
                                "payload": {"status": 500, "messages": ["edge hit failed"]}}]
                }),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/chat",
                serde_json::json!({"session_id": id, "message": "why did the edge hit fail?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat: ChatResponse = json_body(response).await;
        assert_eq!(chat.response, "Stub answer grounded in the session.");
        assert_eq!(chat.metadata.events_retrieved, 1);
    }

    #[tokio::test]
    async fn chat_missing_session_is_404() {
        let app = build_router(test_state());
        let response = app
            .oneshot(json_request(
                "POST",
                "/v1/chat",
                serde_json::json!({"session_id": "ghost", "message": "hello?"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ingest_and_count_documents() {
        let app = build_router(test_state());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/documents",
                serde_json::json!({
                    "title": "Edge Basics",
                    "source": "edge.md",
                    "content": "The Edge extension batches hits and sends them to the Edge Network."
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let ingest: IngestDocumentResponse = json_body(response).await;
        assert!(ingest.chunks >= 1);

        let response = app
            .oneshot(Request::builder().uri("/v1/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats: DocumentsStatsResponse = json_body(response).await;
        assert_eq!(stats.entries, ingest.chunks);
    }
}
