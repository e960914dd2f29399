use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

/// Uniform JSON error body: `{code, message, detail?}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    detail: Option<String>,
) -> Response {
    (
        status,
        Json(ErrorBody {
            code,
            message: message.into(),
            detail,
        }),
    )
        .into_response()
}

/// 410 used for every one-shot token failure, deliberately identical for
/// expired, consumed, and never-existed tokens.
pub fn token_invalid(message: &'static str) -> Response {
    json_error(StatusCode::GONE, "TOKEN_INVALID", message, None)
}

pub fn not_found() -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "not found", None)
}

/// 503 with a retry hint, answered when an admission permit is unavailable.
pub fn busy(message: &'static str) -> Response {
    let mut response = json_error(StatusCode::SERVICE_UNAVAILABLE, "BUSY", message, None);
    response
        .headers_mut()
        .insert(http::header::RETRY_AFTER, http::HeaderValue::from_static("1"));
    response
}
