use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

use crate::gateway::paths::api_error;
use crate::normalize::{
    extract_declarations, from_gemini_parts, to_gemini_tools, NormalizeOptions,
};

/// Accept either a bare array or `{ "<key>": [...] }`.
fn array_field<'a>(body: &'a Value, key: &str) -> Option<&'a [Value]> {
    body.as_array()
        .or_else(|| body.get(key).and_then(Value::as_array))
        .map(Vec::as_slice)
}

/// `POST /api/tools/gemini`: OpenAI tools → Gemini tools block.
pub(crate) async fn api_tools_to_gemini(Json(body): Json<Value>) -> impl IntoResponse {
    let Some(tools) = array_field(&body, "tools") else {
        return api_error(StatusCode::BAD_REQUEST, "expected a tools array").into_response();
    };

    let normalized = to_gemini_tools(tools, NormalizeOptions::from_env());
    let skipped: Vec<Value> = normalized
        .skipped
        .iter()
        .map(|s| serde_json::json!({ "index": s.index, "reason": s.reason.to_string() }))
        .collect();

    Json(serde_json::json!({
        "tools": normalized.value,
        "skipped": skipped,
    }))
    .into_response()
}

/// `POST /api/tools/declarations`: declarations from either tools shape.
pub(crate) async fn api_tools_declarations(Json(body): Json<Value>) -> impl IntoResponse {
    let tools = body.get("tools").unwrap_or(&body);
    Json(serde_json::json!({ "declarations": extract_declarations(tools) }))
}

/// `POST /api/calls/openai`: Gemini response parts → OpenAI tool calls.
pub(crate) async fn api_calls_to_openai(Json(body): Json<Value>) -> impl IntoResponse {
    let Some(parts) = array_field(&body, "parts") else {
        return api_error(StatusCode::BAD_REQUEST, "expected a parts array").into_response();
    };
    Json(serde_json::json!({ "tool_calls": from_gemini_parts(parts) })).into_response()
}
