use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, StatusCode};

use lanferry_common::store::{AddParams, StoreError};
use lanferry_common::text;

use crate::http_server::error::{busy, json_error};
use crate::ServiceState;

use super::FileItem;

pub async fn handler(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let _permit = match state.upload_permits().try_acquire() {
        Ok(permit) => permit,
        Err(_) => return busy("upload concurrency exhausted, retry later"),
    };

    match save_upload(&state, &headers, multipart).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Content-Length is required to keep memory bounded")]
    LengthRequired,
    #[error("request body too large")]
    RequestTooLarge,
    #[error("file too large")]
    FileTooLarge,
    #[error("only multipart/form-data uploads are supported")]
    UnsupportedMediaType,
    #[error("invalid upload: {0}")]
    BadRequest(String),
    #[error("name already in use")]
    NameConflict,
    #[error("not enough space for this upload")]
    InsufficientStorage,
    #[error("save failed: {0}")]
    Internal(String),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            UploadError::LengthRequired => json_error(
                StatusCode::LENGTH_REQUIRED,
                "LENGTH_REQUIRED",
                message,
                None,
            ),
            UploadError::RequestTooLarge | UploadError::FileTooLarge => {
                json_error(StatusCode::PAYLOAD_TOO_LARGE, "TOO_LARGE", message, None)
            }
            UploadError::UnsupportedMediaType => json_error(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UNSUPPORTED_MEDIA_TYPE",
                message,
                None,
            ),
            UploadError::BadRequest(detail) => json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "invalid upload data",
                Some(detail),
            ),
            UploadError::NameConflict => {
                json_error(StatusCode::CONFLICT, "NAME_CONFLICT", message, None)
            }
            UploadError::InsufficientStorage => json_error(
                StatusCode::INSUFFICIENT_STORAGE,
                "INSUFFICIENT_STORAGE",
                message,
                None,
            ),
            UploadError::Internal(detail) => json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "save failed",
                Some(detail),
            ),
        }
    }
}

/// Shared upload pipeline for the desktop endpoint and the phone bridge:
/// admission checks, multipart parsing, best-effort pre-eviction, text
/// detection, store add.
pub async fn save_upload(
    state: &ServiceState,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FileItem, UploadError> {
    let content_length = headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or(UploadError::LengthRequired)?;
    if content_length > state.max_request_bytes() {
        return Err(UploadError::RequestTooLarge);
    }

    let mut multipart = multipart.map_err(|_| UploadError::UnsupportedMediaType)?;
    let (file_name, data) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::BadRequest(e.to_string()))?
            .ok_or_else(|| UploadError::BadRequest("missing file part".to_owned()))?;
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_owned)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| UploadError::BadRequest("file name is empty".to_owned()))?;

        if state.store().has_name(&file_name) {
            return Err(UploadError::NameConflict);
        }

        // Best-effort pre-eviction before reading the body into memory,
        // using Content-Length as an upper-bound estimate.
        let estimated = if content_length == 0 || content_length > state.max_file_bytes() {
            state.max_file_bytes()
        } else {
            content_length
        };
        match state.store().evict_to_fit(estimated) {
            Ok(()) => {}
            Err(StoreError::InsufficientSpace) | Err(StoreError::TooLarge) => {
                return Err(UploadError::InsufficientStorage)
            }
            Err(e) => return Err(UploadError::Internal(e.to_string())),
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::BadRequest(e.to_string()))?;
        break (file_name, data);
    };
    if data.len() as u64 > state.max_file_bytes() {
        return Err(UploadError::FileTooLarge);
    }

    let detection = text::detect(&data);

    let meta = state
        .store()
        .add(AddParams {
            name: file_name,
            bytes: data,
            encoding: detection.encoding,
            is_text: detection.is_text,
            now: None,
        })
        .map_err(|e| match e {
            StoreError::NameConflict => UploadError::NameConflict,
            StoreError::TooLarge | StoreError::InsufficientSpace => {
                UploadError::InsufficientStorage
            }
            StoreError::InvalidInput(msg) => UploadError::BadRequest(msg.to_owned()),
            other => UploadError::Internal(other.to_string()),
        })?;

    tracing::info!(
        id = %meta.id,
        name = %meta.name,
        size_bytes = meta.size_bytes,
        encoding = %meta.encoding,
        is_text = meta.is_text,
        "file stored"
    );
    Ok(FileItem::from(meta))
}
