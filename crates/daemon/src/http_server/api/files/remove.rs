use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::StatusCode;

use lanferry_common::store::StoreError;

use crate::http_server::error::{json_error, not_found};
use crate::ServiceState;

pub async fn handler(State(state): State<ServiceState>, Path(id): Path<String>) -> Response {
    match state.store().delete(&id) {
        Ok(meta) => {
            tracing::info!(id = %meta.id, name = %meta.name, "file deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(StoreError::NotFound) => not_found(),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "delete failed",
            Some(e.to_string()),
        ),
    }
}
