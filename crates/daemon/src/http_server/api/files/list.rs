use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::ServiceState;

use super::FileItem;

/// Lists all stored files in insertion order.
pub async fn handler(State(state): State<ServiceState>) -> impl IntoResponse {
    let items: Vec<FileItem> = state
        .store()
        .list()
        .into_iter()
        .map(FileItem::from)
        .collect();
    Json(items)
}
