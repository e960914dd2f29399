use axum::routing::{get, patch, post};
use axum::Router;

pub mod bridge;
pub mod files;

use crate::ServiceState;

pub fn router() -> Router<ServiceState> {
    Router::new()
        .route(
            "/files",
            get(files::list::handler).post(files::upload::handler),
        )
        .route(
            "/files/:id",
            patch(files::rename::handler).delete(files::remove::handler),
        )
        .route("/files/:id/transcode", post(files::transcode::handler))
        .route(
            "/files/:id/download-token",
            post(files::download_token::handler),
        )
        .route("/bridge/upload", post(bridge::create::upload_handler))
        .route("/bridge/download", post(bridge::create::download_handler))
        .route("/bridge/:token/upload", post(bridge::upload::handler))
        .route(
            "/bridge/:token/download-token",
            post(bridge::download_token::handler),
        )
}
