use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::{header, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use lanferry_common::store::StoreError;
use lanferry_common::tokens::TokenError;

use crate::http_server::error::{json_error, not_found, token_invalid};
use crate::http_server::TOKEN_KIND_DOWNLOAD;
use crate::ServiceState;

/// Streams a file in exchange for a one-shot download token. Expired,
/// consumed, and unknown tokens all answer the same 410.
pub async fn handler(State(state): State<ServiceState>, Path(token): Path<String>) -> Response {
    let item = match state.tokens().consume(&token, TOKEN_KIND_DOWNLOAD) {
        Ok(item) => item,
        Err(TokenError::NotFound) | Err(TokenError::KindMismatch) => {
            return token_invalid("download link no longer valid")
        }
        Err(TokenError::InvalidInput(msg)) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "invalid token",
                Some(msg.to_owned()),
            )
        }
    };

    let entry = match state.store().get(&item.file_id) {
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

    tracing::info!(id = %entry.meta.id, name = %entry.meta.name, "download");

    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_owned()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_owned()),
            (header::CACHE_CONTROL, "no-store".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                content_disposition_attachment(&entry.meta.name),
            ),
        ],
        Body::from(entry.bytes),
    )
        .into_response()
}

/// RFC 5987 attr-char complement: everything percent-encoded except
/// unreserved characters and the few marks the grammar allows.
const ATTR_CHAR_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Builds `attachment; filename="<ascii>"; filename*=UTF-8''<encoded>`,
/// sanitized against header injection and odd client behaviors.
fn content_disposition_attachment(filename: &str) -> String {
    let mut orig = normalize_filename(filename);
    if orig.is_empty() {
        orig = "download".to_owned();
    }
    let mut fallback = ascii_fallback(&orig);
    if fallback.is_empty() {
        fallback = "download".to_owned();
    }
    let fallback = fallback.replace(['\\', '"'], "_");
    let encoded = utf8_percent_encode(&orig, ATTR_CHAR_ENCODE);

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

fn normalize_filename(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '\0' | '\r' | '\n' | '/' | '\\' => '_',
            c => c,
        })
        .collect()
}

fn ascii_fallback(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' | ' ' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_names_pass_through() {
        assert_eq!(
            content_disposition_attachment("notes.txt"),
            "attachment; filename=\"notes.txt\"; filename*=UTF-8''notes.txt"
        );
    }

    #[test]
    fn non_ascii_names_get_fallback_and_encoding() {
        let header = content_disposition_attachment("文件.txt");
        assert!(header.starts_with("attachment; filename=\"__.txt\""));
        assert!(header.contains("filename*=UTF-8''%E6%96%87%E4%BB%B6.txt"));
    }

    #[test]
    fn header_injection_characters_are_neutralized() {
        let header = content_disposition_attachment("a\r\nContent-Type: evil");
        assert!(!header.contains('\r'));
        assert!(!header.contains('\n'));
    }

    #[test]
    fn path_separators_are_replaced() {
        let header = content_disposition_attachment("../../etc/passwd");
        assert!(header.contains("filename=\".._.._etc_passwd\""));
    }

    #[test]
    fn empty_name_falls_back() {
        assert!(content_disposition_attachment("  ").contains("filename=\"download\""));
    }
}
