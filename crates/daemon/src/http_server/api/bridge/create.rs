use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Deserialize;

use lanferry_common::store::StoreError;

use crate::http_server::error::{json_error, not_found};
use crate::http_server::{TOKEN_KIND_BRIDGE_DOWNLOAD, TOKEN_KIND_BRIDGE_UPLOAD};
use crate::ServiceState;

use super::BridgeCreateResponse;

/// Mints a bridge-upload token: the phone that scans the QR may push one
/// file into the store. Not bound to any file id.
pub async fn upload_handler(State(state): State<ServiceState>) -> Response {
    match state
        .tokens()
        .create(TOKEN_KIND_BRIDGE_UPLOAD, "", state.bridge_ttl())
    {
        Ok(item) => {
            let page_url = format!("/m/upload/{}", item.token);
            Json(BridgeCreateResponse::new(item.token, page_url)).into_response()
        }
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "failed to create bridge link",
            Some(e.to_string()),
        ),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBridgeDownloadRequest {
    pub file_id: String,
}

/// Mints a bridge-download token bound to an existing file.
pub async fn download_handler(
    State(state): State<ServiceState>,
    body: Result<Json<CreateBridgeDownloadRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "request body is not valid JSON",
                Some(rejection.body_text()),
            )
        }
    };
    if req.file_id.is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "missing fileId",
            None,
        );
    }

    match state.store().get_meta(&req.file_id) {
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
        .create(TOKEN_KIND_BRIDGE_DOWNLOAD, &req.file_id, state.bridge_ttl())
    {
        Ok(item) => {
            let page_url = format!("/m/download/{}", item.token);
            Json(BridgeCreateResponse::new(item.token, page_url)).into_response()
        }
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "failed to create bridge link",
            Some(e.to_string()),
        ),
    }
}
