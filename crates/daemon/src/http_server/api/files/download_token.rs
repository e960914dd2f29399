use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

use lanferry_common::store::StoreError;

use crate::http_server::error::{json_error, not_found};
use crate::http_server::TOKEN_KIND_DOWNLOAD;
use crate::ServiceState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTokenResponse {
    pub token: String,
    pub url: String,
}

/// Mints a one-shot download token for an existing file.
pub async fn handler(State(state): State<ServiceState>, Path(id): Path<String>) -> Response {
    match state.store().get_meta(&id) {
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
        .create(TOKEN_KIND_DOWNLOAD, &id, state.download_ttl())
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
