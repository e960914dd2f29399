use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, StatusCode};

use lanferry_common::tokens::TokenError;

use crate::http_server::api::files::upload::save_upload;
use crate::http_server::error::{busy, json_error, token_invalid};
use crate::http_server::TOKEN_KIND_BRIDGE_UPLOAD;
use crate::ServiceState;

/// Phone-side upload: consumes the bridge token, then runs the same upload
/// pipeline as the desktop endpoint.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match state.tokens().consume(&token, TOKEN_KIND_BRIDGE_UPLOAD) {
        Ok(_) => {}
        Err(TokenError::NotFound) | Err(TokenError::KindMismatch) => {
            return token_invalid("QR code no longer valid")
        }
        Err(TokenError::InvalidInput(msg)) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "invalid token",
                Some(msg.to_owned()),
            )
        }
    }

    let _permit = match state.upload_permits().try_acquire() {
        Ok(permit) => permit,
        Err(_) => return busy("upload concurrency exhausted, retry later"),
    };

    match save_upload(&state, &headers, multipart).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => e.into_response(),
    }
}
