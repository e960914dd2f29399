use serde::Serialize;

pub mod create;
pub mod download_token;
pub mod upload;

/// Response to both bridge-mint endpoints: the token itself, the phone page
/// it unlocks, and the QR image that encodes the page URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCreateResponse {
    pub bridge_token: String,
    pub page_url: String,
    pub qr_url: String,
}

impl BridgeCreateResponse {
    pub fn new(token: String, page_url: String) -> Self {
        Self {
            page_url,
            qr_url: format!("/qrcode/{token}.png"),
            bridge_token: token,
        }
    }
}
