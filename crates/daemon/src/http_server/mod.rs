use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;

pub mod api;
mod download;
pub mod error;
mod html;
mod qr;
mod static_assets;

use crate::ServiceState;

/// Capability kinds carried by registry tokens.
pub const TOKEN_KIND_DOWNLOAD: &str = "download";
pub const TOKEN_KIND_BRIDGE_UPLOAD: &str = "bridge-upload";
pub const TOKEN_KIND_BRIDGE_DOWNLOAD: &str = "bridge-download";

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("serve: {0}")]
    Serve(#[from] std::io::Error),
}

pub fn router(state: ServiceState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    let body_limit = state.max_request_bytes() as usize;

    Router::new()
        .nest("/api", api::router())
        .route("/dl/:token", get(download::handler))
        .route("/qrcode/:token", get(qr::handler))
        .merge(html::router())
        .route("/", get(static_assets::index_handler))
        .route("/assets/*path", get(static_assets::assets_handler))
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(trace_layer)
}

async fn not_found_handler() -> axum::response::Response {
    error::not_found()
}

pub async fn run(
    listen: &str,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|source| HttpServerError::Bind {
            addr: listen.to_owned(),
            source,
        })?;
    tracing::info!(addr = %listen, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}
