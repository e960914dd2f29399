use askama::Template;
use askama_axum::IntoResponse;
use axum::extract::{Path, State};
use axum::response::{Html, Response};
use axum::routing::get;
use axum::Router;
use http::StatusCode;

use lanferry_common::store::StoreError;
use lanferry_common::tokens::TokenError;

use crate::http_server::error::json_error;
use crate::http_server::{TOKEN_KIND_BRIDGE_DOWNLOAD, TOKEN_KIND_BRIDGE_UPLOAD};
use crate::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route("/m/upload/:token", get(mobile_upload_handler))
        .route("/m/download/:token", get(mobile_download_handler))
}

#[derive(Template)]
#[template(path = "mobile_upload.html")]
struct MobileUploadTemplate {
    token: String,
}

#[derive(Template)]
#[template(path = "mobile_download.html")]
struct MobileDownloadTemplate {
    token: String,
    file_name: String,
    size_bytes: u64,
    encoding: String,
}

#[derive(Template)]
#[template(path = "bridge_gone.html")]
struct BridgeGoneTemplate;

/// Phone page behind a bridge-upload QR. Peeks (does not consume) the
/// token; the consume happens when the form posts.
async fn mobile_upload_handler(
    State(state): State<ServiceState>,
    Path(token): Path<String>,
) -> Response {
    match peek_kind(&state, &token, TOKEN_KIND_BRIDGE_UPLOAD) {
        Ok(()) => MobileUploadTemplate { token }.into_response(),
        Err(page) => page,
    }
}

async fn mobile_download_handler(
    State(state): State<ServiceState>,
    Path(token): Path<String>,
) -> Response {
    let item = match state.tokens().peek(&token) {
        Ok(item) if item.kind == TOKEN_KIND_BRIDGE_DOWNLOAD => item,
        Ok(_) | Err(TokenError::NotFound) => return gone_page(),
        Err(e) => return internal(e.to_string()),
    };
    let meta = match state.store().get_meta(&item.file_id) {
        Ok(meta) => meta,
        Err(StoreError::NotFound) => return gone_page(),
        Err(e) => return internal(e.to_string()),
    };

    MobileDownloadTemplate {
        token,
        file_name: meta.name,
        size_bytes: meta.size_bytes,
        encoding: meta.encoding.label().to_owned(),
    }
    .into_response()
}

fn peek_kind(state: &ServiceState, token: &str, kind: &str) -> Result<(), Response> {
    match state.tokens().peek(token) {
        Ok(item) if item.kind == kind => Ok(()),
        Ok(_) | Err(TokenError::NotFound) => Err(gone_page()),
        Err(e) => Err(internal(e.to_string())),
    }
}

fn gone_page() -> Response {
    let body = BridgeGoneTemplate.render().unwrap_or_else(|_| {
        "<!doctype html><html><body><h1>QR code no longer valid</h1></body></html>".to_owned()
    });
    (StatusCode::GONE, Html(body)).into_response()
}

fn internal(detail: String) -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL",
        "page load failed",
        Some(detail),
    )
}
