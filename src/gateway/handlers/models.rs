use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::gateway::paths::api_error;
use crate::gateway::AppState;

/// `GET /api/models`: catalog grouped by provider.
pub(crate) async fn api_models_list(State(state): State<AppState>) -> impl IntoResponse {
    let router = state.relay.router();
    Json(serde_json::json!({
        "default_model": router.default_model(),
        "fallback_models": router.fallback_models(),
        "models": router.list_models(),
    }))
}

/// `GET /api/models/:alias`
pub(crate) async fn api_model_resolve(
    State(state): State<AppState>,
    Path(alias): Path<String>,
) -> impl IntoResponse {
    match state.relay.router().resolve(&alias) {
        Some(record) => Json(record).into_response(),
        None => api_error(StatusCode::NOT_FOUND, format!("unknown model: {alias}")).into_response(),
    }
}
