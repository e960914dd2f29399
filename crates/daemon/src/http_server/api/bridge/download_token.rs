use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;

use lanferry_common::store::StoreError;
use lanferry_common::tokens::TokenError;

use crate::http_server::api::files::download_token::DownloadTokenResponse;
use crate::http_server::error::{json_error, not_found, token_invalid};
use crate::http_server::{TOKEN_KIND_BRIDGE_DOWNLOAD, TOKEN_KIND_DOWNLOAD};
use crate::ServiceState;

/// Called by the phone page after the user consents: consumes the bridge
/// token and cascades into a fresh one-shot download token for the same
/// file.
pub async fn handler(State(state): State<ServiceState>, Path(token): Path<String>) -> Response {
    let bridge_item = match state.tokens().consume(&token, TOKEN_KIND_BRIDGE_DOWNLOAD) {
        Ok(item) => item,
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
    };

    match state.store().get_meta(&bridge_item.file_id) {
        Ok(_) => {}
        Err(StoreError::NotFound) => return not_found(),
        Err(e) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "read failed",
                Some(e.to_string()),
            )
        }
    }

    match state
        .tokens()
        .create(TOKEN_KIND_DOWNLOAD, &bridge_item.file_id, state.download_ttl())
    {
        Ok(item) => Json(DownloadTokenResponse {
            url: format!("/dl/{}", item.token),
            token: item.token,
        })
        .into_response(),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "failed to create download link",
            Some(e.to_string()),
        ),
    }
}
