use axum::{http::StatusCode, Json};

use crate::transcript::validate_segment;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// Reject path segments that could escape their directory.
pub fn validate_path_segment(s: &str) -> Result<(), ApiError> {
    validate_segment(s).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "invalid path segment", "value": s})),
        )
    })
}

pub(crate) fn api_error(status: StatusCode, msg: impl std::fmt::Display) -> ApiError {
    (status, Json(serde_json::json!({ "error": msg.to_string() })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_separators() {
        for bad in ["", "..", "a/b", "a\\b", "x..y", "nul\0"] {
            assert!(validate_path_segment(bad).is_err(), "{bad:?}");
        }
        assert!(validate_path_segment("ses_01HX").is_ok());
        let (status, _) = validate_path_segment("..").unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
