use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use http::StatusCode;
use serde::Deserialize;

use lanferry_common::store::{ReplaceParams, StoreError};
use lanferry_common::text::{strict_transcode, Encoding, SourceEncoding, TextError};

use crate::http_server::error::{busy, json_error, not_found};
use crate::ServiceState;

use super::FileItem;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeRequest {
    #[serde(default)]
    pub source_encoding: Option<String>,
    #[serde(default)]
    pub target_encoding: Option<String>,
}

/// Re-encodes a stored text file in place. The conversion runs outside any
/// store lock; on any failure the stored bytes and encoding are untouched.
pub async fn handler(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    body: Result<Json<TranscodeRequest>, JsonRejection>,
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

    let target_label = req.target_encoding.unwrap_or_default();
    if target_label.trim().is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "missing targetEncoding",
            None,
        );
    }
    let target = match target_label.trim().parse::<Encoding>() {
        Ok(enc) if Encoding::targets().contains(&enc) => enc,
        _ => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "targetEncoding is not in the allowed list",
                None,
            )
        }
    };
    let source = match SourceEncoding::parse(&req.source_encoding.unwrap_or_default()) {
        Some(SourceEncoding::Named(Encoding::Unknown)) | None => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "sourceEncoding is not in the allowed list",
                None,
            )
        }
        Some(source) => source,
    };

    let _permit = match state.transcode_permits().try_acquire() {
        Ok(permit) => permit,
        Err(_) => return busy("transcode concurrency exhausted, retry later"),
    };

    let entry = match state.store().get(&id) {
        Ok(entry) => entry,
        Err(StoreError::NotFound) => return not_found(),
        Err(e) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "read failed",
                Some(e.to_string()),
            )
        }
    };
    if !entry.meta.is_text {
        return json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "transcoding unavailable (not recognizable text)",
            None,
        );
    }

    // CPU-heavy conversion stays off the async workers.
    let bytes = entry.bytes;
    let converted =
        tokio::task::spawn_blocking(move || strict_transcode(&bytes, source, target)).await;
    let (out, resolved_target) = match converted {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => return transcode_error(e),
        Err(join_err) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "transcode failed",
                Some(join_err.to_string()),
            )
        }
    };

    match state.store().replace_bytes(ReplaceParams {
        id,
        bytes: Bytes::from(out),
        encoding: resolved_target,
        is_text: true,
    }) {
        Ok(meta) => {
            tracing::info!(
                id = %meta.id,
                encoding = %meta.encoding,
                size_bytes = meta.size_bytes,
                "file transcoded"
            );
            Json(FileItem::from(meta)).into_response()
        }
        // concurrent delete while the conversion was running
        Err(StoreError::NotFound) => not_found(),
        Err(StoreError::ReplaceWouldExceed) | Err(StoreError::TooLarge) => json_error(
            StatusCode::INSUFFICIENT_STORAGE,
            "INSUFFICIENT_STORAGE",
            "not enough space for the transcoded bytes",
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
            "write of transcoded bytes failed",
            Some(e.to_string()),
        ),
    }
}

fn transcode_error(e: TextError) -> Response {
    match e {
        TextError::NotText => json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "transcoding unavailable (not recognizable text)",
            None,
        ),
        TextError::UnsupportedEncoding | TextError::UnknownSource | TextError::InvalidInput(_) => {
            json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "invalid encoding parameters",
                Some(e.to_string()),
            )
        }
        TextError::DecodeFailed => json_error(
            StatusCode::BAD_REQUEST,
            "TRANSCODE_FAILED",
            "source decoding failed",
            None,
        ),
        TextError::EncodeFailed | TextError::Unrepresentable => json_error(
            StatusCode::BAD_REQUEST,
            "TRANSCODE_FAILED",
            "content is not representable in the target encoding",
            None,
        ),
    }
}
