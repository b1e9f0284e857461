use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::gateway::paths::{api_error, validate_path_segment};
use crate::gateway::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct SignatureBody {
    signature: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FetchSessionBody {
    #[serde(default)]
    session_id: Option<String>,
}

/// `GET /api/signatures/:session_key`
pub(crate) async fn api_signature_get(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
) -> impl IntoResponse {
    match state.continuity.get_signature(&session_key) {
        Some(signature) => Json(serde_json::json!({
            "session_key": session_key,
            "signature": signature,
        }))
        .into_response(),
        None => api_error(StatusCode::NOT_FOUND, "no signature for session").into_response(),
    }
}

/// `PUT /api/signatures/:session_key`
pub(crate) async fn api_signature_put(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
    Json(body): Json<SignatureBody>,
) -> impl IntoResponse {
    if body.signature.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "signature must not be empty").into_response();
    }
    state.continuity.set_signature(&session_key, &body.signature);
    StatusCode::NO_CONTENT.into_response()
}

/// `DELETE /api/signatures/:session_key`
pub(crate) async fn api_signature_delete(
    State(state): State<AppState>,
    Path(session_key): Path<String>,
) -> impl IntoResponse {
    state.continuity.clear_signature(&session_key);
    StatusCode::NO_CONTENT
}

/// `POST /api/fetch/:instance/session`: bound session id, minted on
/// first use. An optional `{ "session_id" }` body rebinds it.
pub(crate) async fn api_fetch_session(
    State(state): State<AppState>,
    Path(instance): Path<String>,
    body: Option<Json<FetchSessionBody>>,
) -> impl IntoResponse {
    if let Err(e) = validate_path_segment(&instance) {
        return e.into_response();
    }
    let explicit = body.and_then(|Json(b)| b.session_id);
    let session_id = state
        .continuity
        .get_or_create_session_id(&instance, explicit.as_deref());
    Json(serde_json::json!({
        "instance": instance,
        "session_id": session_id,
    }))
    .into_response()
}

/// `DELETE /api/fetch/:instance`: drop the instance's session id and any
/// signature stored under the same key.
pub(crate) async fn api_fetch_clear(
    State(state): State<AppState>,
    Path(instance): Path<String>,
) -> impl IntoResponse {
    state.continuity.clear_all(&instance);
    StatusCode::NO_CONTENT
}

/// `GET /api/continuity/stats`
pub(crate) async fn api_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.continuity.stats())
}
