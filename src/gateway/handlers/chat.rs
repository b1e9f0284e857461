use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::gateway::paths::api_error;
use crate::gateway::AppState;
use crate::relay::ChatRequest;

pub(crate) const SESSION_KEY_HEADER: &str = "x-session-key";

/// `POST /v1/chat/completions`
///
/// The continuity key comes from the `x-session-key` header, or the
/// body's `session_key` when the header is absent.
pub(crate) async fn api_chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut req): Json<ChatRequest>,
) -> impl IntoResponse {
    if let Some(key) = headers
        .get(SESSION_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        req.session_key = Some(key.to_string());
    }

    if req.messages.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "messages must not be empty").into_response();
    }
    if let Err(e) = state.relay.router().candidates(req.model.as_deref()) {
        return api_error(StatusCode::BAD_REQUEST, format!("{e:#}")).into_response();
    }

    match state.relay.chat(&req).await {
        Ok(completion) => Json(completion).into_response(),
        Err(e) => api_error(StatusCode::BAD_GATEWAY, format!("{e:#}")).into_response(),
    }
}
