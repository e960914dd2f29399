mod detect;
mod encodings;
mod transcode;

pub use detect::{detect, Detection};
pub use encodings::{Encoding, SourceEncoding, SOURCE_AUTO};
pub use transcode::strict_transcode;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("not recognizable text")]
    NotText,
    #[error("unsupported encoding")]
    UnsupportedEncoding,
    #[error("unknown source encoding")]
    UnknownSource,
    #[error("decode failed")]
    DecodeFailed,
    #[error("encode failed")]
    EncodeFailed,
    #[error("unrepresentable in target encoding")]
    Unrepresentable,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}
