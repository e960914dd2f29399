use axum::body::Body;
use axum::extract::Path;
use axum::response::{IntoResponse, Response};
use http::{header, StatusCode};
use rust_embed::RustEmbed;

use crate::http_server::error::not_found;

/// Desktop UI, embedded in the binary.
#[derive(RustEmbed)]
#[folder = "static"]
struct StaticAssets;

pub async fn index_handler() -> Response {
    serve("index.html")
}

pub async fn assets_handler(Path(path): Path<String>) -> Response {
    serve(&format!("assets/{path}"))
}

fn serve(path: &str) -> Response {
    match StaticAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_ref())
                .header(header::CACHE_CONTROL, "no-store")
                .body(Body::from(content.data.to_vec()))
                .unwrap_or_else(|_| not_found())
        }
        None => not_found(),
    }
}
