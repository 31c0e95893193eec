//! HTTP API gateway for Confab.
//!
//! Exposes the REST surface of the chat service:
//!
//! - `GET  /`                          service descriptor
//! - `POST /api/chat`                  send a message, get the assistant reply
//! - `POST /api/clear`                 reset a session's context window
//! - `GET  /api/history/{session_id}`  recent persisted exchanges
//! - `GET  /api/health`                liveness check
//! - `GET  /ui`                        embedded browser chat client
//!
//! Built on Axum for async HTTP. CORS is permissive so browser clients can
//! call the API from any origin.

pub mod frontend;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use confab_chat::{ChatEngine, ContextStore};
use confab_core::{Error, HistoryRecord, HistoryStore, Provider, SessionId};
use confab_history::SqliteHistory;
use confab_providers::OpenAiProvider;

/// How many exchanges a history query returns when the client does not say.
const DEFAULT_HISTORY_LIMIT: u32 = 50;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared application state for the gateway.
pub struct GatewayState {
    pub engine: ChatEngine,
    pub store: Arc<ContextStore>,
    pub history: Arc<dyn HistoryStore>,
}

pub type SharedState = Arc<GatewayState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/clear", post(clear_handler))
        .route("/api/history/{session_id}", get(history_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
        .merge(frontend::frontend_router())
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    /// The user's message.
    message: String,
    /// Session to continue (omit for the shared default session).
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    response: String,
    session_id: String,
}

#[derive(Deserialize)]
struct ClearRequest {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ClearResponse {
    message: String,
}

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
    endpoints: EndpointIndex,
}

#[derive(Serialize)]
struct EndpointIndex {
    chat: &'static str,
    clear: &'static str,
    history: &'static str,
    health: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        name: "Confab",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: EndpointIndex {
            chat: "/api/chat",
            clear: "/api/clear",
            history: "/api/history/{session_id}",
            health: "/api/health",
        },
    })
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session = payload
        .session_id
        .map(|s| SessionId::from(&s))
        .unwrap_or_default();

    info!(
        session_id = %session,
        message_len = payload.message.len(),
        "Chat request"
    );

    // Run the turn on a detached task: if the client disconnects, axum drops
    // this handler future, but the generation and the history write must
    // still run to completion.
    let task = tokio::spawn(run_turn(state, payload.message, session.clone()));

    let outcome = match task.await {
        Ok(result) => result,
        Err(e) => Err(Error::Internal(format!("chat task aborted: {e}"))),
    };

    match outcome {
        Ok(response) => Ok(Json(ChatResponse {
            response,
            session_id: session.to_string(),
        })),
        Err(e) => {
            error!(session_id = %session, error = %e, "Chat turn failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to generate response: {e}"),
                }),
            ))
        }
    }
}

/// One full chat turn: generate the reply, then persist the exchange.
///
/// The history write happens after the reply exists; if it fails the
/// exchange is still served and the failure is only logged.
async fn run_turn(
    state: SharedState,
    message: String,
    session: SessionId,
) -> confab_core::Result<String> {
    let reply = state.engine.generate(&message, &session).await?;

    if let Err(e) = state.history.record(session.as_str(), &message, &reply).await {
        warn!(session_id = %session, error = %e, "History write failed, reply still served");
    }

    Ok(reply)
}

async fn clear_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ClearRequest>,
) -> Json<ClearResponse> {
    let session = payload
        .session_id
        .map(|s| SessionId::from(&s))
        .unwrap_or_default();

    state.store.clear(&session).await;
    info!(session_id = %session, "Session context cleared");

    Json(ClearResponse {
        message: format!("Session {session} cleared successfully"),
    })
}

async fn history_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryRecord>>, (StatusCode, Json<ErrorResponse>)> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let mut records = state
        .history
        .recent(&session_id, limit)
        .await
        .map_err(|e| {
            error!(session_id = %session_id, error = %e, "History query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to retrieve history: {e}"),
                }),
            )
        })?;

    // The store returns newest first; clients read oldest first.
    records.reverse();

    Ok(Json(records))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// ── Server ────────────────────────────────────────────────────────────────

/// Start the gateway HTTP server.
///
/// Builds the provider, context store, engine, and history pool once and
/// shares them across all handlers.
pub async fn start(config: confab_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.server.addr();

    if !config.has_api_key() {
        warn!("No API key configured; provider requests will fail until one is set");
    }

    let provider: Arc<dyn Provider> = Arc::new(OpenAiProvider::from_config(&config.provider));
    let store = Arc::new(ContextStore::new());
    let history: Arc<dyn HistoryStore> =
        Arc::new(SqliteHistory::new(&config.history.database_path).await?);

    let engine = ChatEngine::new(
        provider,
        store.clone(),
        &config.provider.model,
        config.provider.temperature,
    )
    .with_max_tokens(config.provider.max_tokens)
    .with_max_context_messages(config.context.max_messages);

    let state = Arc::new(GatewayState {
        engine,
        store,
        history,
    });
    let app = build_router(state);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining");
}
