//! HTTP gateway.
//!
//! Serves:
//! - `GET /api/status`, `GET /api/health`
//! - `GET /api/models`, `GET /api/models/:alias`
//! - `POST /api/tools/gemini`, `POST /api/tools/declarations`, `POST /api/calls/openai`
//! - `GET|PUT|DELETE /api/signatures/:session_key`
//! - `POST /api/fetch/:instance/session`, `DELETE /api/fetch/:instance`
//! - `POST /api/sessions/:session_id/inject`, `GET /api/sessions/:session_id/messages`
//! - `POST /v1/chat/completions`

mod handlers;
mod paths;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::continuity::ContinuityStore;
use crate::inject::MessageInjector;
use crate::relay::Relay;

pub use paths::validate_path_segment;

/// Handle returned by [`start_gateway`].
pub struct Gateway {
    /// Server task handle.
    pub handle: JoinHandle<()>,
    /// The address the server is actually listening on.
    pub addr: SocketAddr,
}

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub continuity: Arc<ContinuityStore>,
    pub injector: Arc<MessageInjector>,
}

impl AppState {
    pub fn new(
        relay: Arc<Relay>,
        continuity: Arc<ContinuityStore>,
        injector: Arc<MessageInjector>,
    ) -> Self {
        Self {
            relay,
            continuity,
            injector,
        }
    }
}

/// Build the full route table.
pub fn router(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/status", get(handlers::health::status_handler))
        .route("/health", get(handlers::health::api_health))
        // Models
        .route("/models", get(handlers::models::api_models_list))
        .route("/models/:alias", get(handlers::models::api_model_resolve))
        // Format conversion
        .route("/tools/gemini", post(handlers::tools::api_tools_to_gemini))
        .route("/tools/declarations", post(handlers::tools::api_tools_declarations))
        .route("/calls/openai", post(handlers::tools::api_calls_to_openai))
        // Continuity
        .route(
            "/signatures/:session_key",
            get(handlers::continuity::api_signature_get)
                .put(handlers::continuity::api_signature_put)
                .delete(handlers::continuity::api_signature_delete),
        )
        .route(
            "/fetch/:instance/session",
            post(handlers::continuity::api_fetch_session),
        )
        .route("/fetch/:instance", delete(handlers::continuity::api_fetch_clear))
        .route("/continuity/stats", get(handlers::continuity::api_stats))
        // Transcripts
        .route(
            "/sessions/:session_id/inject",
            post(handlers::sessions::api_session_inject),
        )
        .route(
            "/sessions/:session_id/messages",
            get(handlers::sessions::api_session_messages),
        );

    Router::new()
        .nest("/api", api_router)
        .route("/v1/chat/completions", post(handlers::chat::api_chat_completions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the gateway HTTP server on `addr`.
pub async fn start_gateway(addr: SocketAddr, state: AppState) -> std::io::Result<Gateway> {
    let _ = handlers::health::STARTUP_TIME.set(std::time::Instant::now());

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("gateway server error: {e}");
        }
    });

    info!(%bound_addr, "gateway started");

    Ok(Gateway {
        handle,
        addr: bound_addr,
    })
}
