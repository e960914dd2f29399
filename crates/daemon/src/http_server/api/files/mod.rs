use serde::Serialize;
use time::OffsetDateTime;

use lanferry_common::store::FileMeta;
use lanferry_common::text::Encoding;

pub mod download_token;
pub mod list;
pub mod remove;
pub mod rename;
pub mod transcode;
pub mod upload;

/// Wire shape of a stored file, shared by every file-facing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FileItem {
    pub id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub size_bytes: u64,
    pub encoding: Encoding,
    pub is_text: bool,
}

impl From<FileMeta> for FileItem {
    fn from(meta: FileMeta) -> Self {
        Self {
            id: meta.id,
            name: meta.name,
            created_at: meta.created_at,
            size_bytes: meta.size_bytes,
            encoding: meta.encoding,
            is_text: meta.is_text,
        }
    }
}
