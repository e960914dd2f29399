use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Deserialize;

use lanferry_common::store::StoreError;

use crate::http_server::error::{json_error, not_found};
use crate::ServiceState;

use super::FileItem;

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

pub async fn handler(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    body: Result<Json<RenameRequest>, JsonRejection>,
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
    if req.name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "missing name", None);
    }

    match state.store().rename(&id, &req.name) {
        Ok(meta) => Json(FileItem::from(meta)).into_response(),
        Err(StoreError::NotFound) => not_found(),
        // conflicts reject outright; the store guarantees the original
        // name binding is untouched
        Err(StoreError::NameConflict) => json_error(
            StatusCode::CONFLICT,
            "NAME_CONFLICT",
            "name already in use",
            None,
        ),
        Err(StoreError::InvalidInput(msg)) => json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "invalid request",
            Some(msg.to_owned()),
        ),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "rename failed",
            Some(e.to_string()),
        ),
    }
}
