use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::warn;

use crate::gateway::paths::{api_error, validate_path_segment};
use crate::gateway::AppState;
use crate::inject::InjectContext;

#[derive(Debug, Deserialize)]
pub(crate) struct InjectBody {
    #[serde(alias = "content")]
    text: String,
    #[serde(flatten)]
    context: InjectContext,
}

/// `POST /api/sessions/:session_id/inject` → `{ ok }`
pub(crate) async fn api_session_inject(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<InjectBody>,
) -> impl IntoResponse {
    if let Err(e) = validate_path_segment(&session_id) {
        return e.into_response();
    }
    let ok = state
        .injector
        .inject(&session_id, &body.text, &body.context)
        .await;
    Json(serde_json::json!({ "ok": ok })).into_response()
}

/// `GET /api/sessions/:session_id/messages`: newest first, each with
/// its parts.
pub(crate) async fn api_session_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = validate_path_segment(&session_id) {
        return e.into_response();
    }
    let store = state.injector.store();

    let messages = match store.list_messages(&session_id).await {
        Ok(m) => m,
        Err(e) => {
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into_response()
        }
    };

    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let parts = match store.list_parts(&message.id).await {
            Ok(parts) => parts,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "failed to read parts");
                Vec::new()
            }
        };
        out.push(serde_json::json!({ "info": message, "parts": parts }));
    }

    Json(serde_json::json!({
        "session_id": session_id,
        "messages": out,
    }))
    .into_response()
}
