//! HTTP API gateway for TracePilot.
//!
//! Exposes REST endpoints for session management, telemetry upload, chat,
//! knowledge base ingestion, and an SSE stream of pipeline events.
//!
//! Built on Axum. The gateway is plumbing around the workflow crate: every
//! chat request flows through one `Orchestrator::chat` call.

pub mod api_v1;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use tracepilot_config::AppConfig;
use tracepilot_core::error::Error;
use tracepilot_core::event::EventBus;
use tracepilot_core::index::SemanticIndex;
use tracepilot_core::session::SessionStore;
use tracepilot_index::{load_dir, EmbeddingBackend, InMemoryIndex};
use tracepilot_providers::build_default_model;
use tracepilot_session::InMemorySessionStore;
use tracepilot_workflow::{Orchestrator, WorkflowConfig};

/// Shared application state for the gateway.
pub struct ApiState {
    pub store: Arc<dyn SessionStore>,
    pub knowledge_base: Arc<dyn SemanticIndex>,
    pub orchestrator: Arc<Orchestrator>,
    pub event_bus: Arc<EventBus>,
    pub config: AppConfig,
    pub start_time: DateTime<Utc>,
}

pub type SharedApiState = Arc<ApiState>;

/// Build the full router: health at the root, v1 API nested.
pub fn build_router(state: SharedApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024)) // 4 MB event batches
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Wire up all subsystems from configuration.
pub async fn build_state(config: AppConfig) -> Result<SharedApiState, Error> {
    let model = build_default_model(&config)?;

    let embedder = config.embedding_model.clone().map(|embedding_model| {
        EmbeddingBackend {
            model: model.clone(),
            embedding_model,
        }
    });

    let store = Arc::new(match embedder.clone() {
        Some(embedder) => InMemorySessionStore::with_embedder(embedder),
        None => InMemorySessionStore::new(),
    });

    let knowledge_base = Arc::new(match embedder {
        Some(embedder) => InMemoryIndex::with_embedder("knowledge_base", embedder),
        None => InMemoryIndex::new("knowledge_base"),
    });

    for dir in &config.knowledge.dirs {
        match load_dir(
            knowledge_base.as_ref(),
            dir,
            config.knowledge.chunk_tokens,
            config.knowledge.chunk_overlap_tokens,
        )
        .await
        {
            Ok(stats) => info!(
                dir = %dir.display(),
                files = stats.files,
                chunks = stats.chunks,
                "Knowledge directory loaded"
            ),
            Err(e) => warn!(dir = %dir.display(), error = %e, "Knowledge directory failed to load"),
        }
    }

    let event_bus = Arc::new(EventBus::default());
    let orchestrator = Arc::new(Orchestrator::new(
        model,
        store.clone(),
        knowledge_base.clone(),
        event_bus.clone(),
        WorkflowConfig::from_app_config(&config),
    ));

    Ok(Arc::new(ApiState {
        store,
        knowledge_base,
        orchestrator,
        event_bus,
        config,
        start_time: Utc::now(),
    }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(config).await?;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}

// ── Health ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<SharedApiState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
    })
}
