use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use http::{header, StatusCode};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Luma};
use qrcode::{EcLevel, QrCode};

use lanferry_common::tokens::TokenError;

use crate::http_server::error::{json_error, not_found, token_invalid};
use crate::http_server::{TOKEN_KIND_BRIDGE_DOWNLOAD, TOKEN_KIND_BRIDGE_UPLOAD};
use crate::ServiceState;

const QR_SIZE_PX: u32 = 256;

/// Renders `GET /qrcode/<bridge-token>.png`: peeks the token (QR display
/// must not consume it), maps its kind to the phone page, and encodes the
/// absolute page URL.
pub async fn handler(State(state): State<ServiceState>, Path(param): Path<String>) -> Response {
    let Some(token) = param.strip_suffix(".png") else {
        return not_found();
    };
    if token.is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "missing bridge token",
            None,
        );
    }

    let item = match state.tokens().peek(token) {
        Ok(item) => item,
        Err(TokenError::NotFound) => return token_invalid("QR code no longer valid"),
        Err(e) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "token lookup failed",
                Some(e.to_string()),
            )
        }
    };

    let page_path = match item.kind.as_str() {
        TOKEN_KIND_BRIDGE_UPLOAD => format!("/m/upload/{token}"),
        TOKEN_KIND_BRIDGE_DOWNLOAD => format!("/m/download/{token}"),
        _ => return token_invalid("QR code no longer valid"),
    };
    let absolute_url = format!(
        "{}{}",
        state.external_origin().trim_end_matches('/'),
        page_path
    );

    let png = match render_png(&absolute_url) {
        Ok(png) => png,
        Err(detail) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "QR rendering failed",
                Some(detail),
            )
        }
    };

    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response()
}

fn render_png(url: &str) -> Result<Vec<u8>, String> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)
        .map_err(|e| e.to_string())?;
    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_SIZE_PX, QR_SIZE_PX)
        .build();

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&img, img.width(), img.height(), ExtendedColorType::L8)
        .map_err(|e| e.to_string())?;
    Ok(png)
}
