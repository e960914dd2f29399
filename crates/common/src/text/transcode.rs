//! Strict, round-trip-verified transcoding.
//!
//! Conversion pivots through a UTF-8 intermediate and fails closed at every
//! step: the full input must decode exactly, and non-UTF-8 output is decoded
//! again and compared to the intermediate so an encoder that silently
//! substituted a replacement character can never leak lossy bytes.

use super::detect::{decode_strict, detect};
use super::encodings::{Encoding, SourceEncoding};
use super::TextError;

/// Converts `src` from `source` to `target`.
///
/// With `SourceEncoding::Auto` the buffer first runs through detection and
/// is rejected with [`TextError::NotText`] unless it classifies as
/// recognizable text. On success returns the converted bytes and the
/// resolved target label; on failure the input is untouched and no bytes
/// are returned.
pub fn strict_transcode(
    src: &[u8],
    source: SourceEncoding,
    target: Encoding,
) -> Result<(Vec<u8>, Encoding), TextError> {
    if target == Encoding::Unknown {
        return Err(TextError::UnsupportedEncoding);
    }

    let source = match source {
        SourceEncoding::Auto => {
            let d = detect(src);
            if !d.is_text || d.encoding == Encoding::Unknown {
                return Err(TextError::NotText);
            }
            d.encoding
        }
        SourceEncoding::Named(Encoding::Unknown) => return Err(TextError::UnknownSource),
        SourceEncoding::Named(enc) => enc,
    };

    // The intermediate is a String, so its UTF-8 validity is guaranteed by
    // construction; decode_strict is the only producer.
    let intermediate = decode_strict(source, src)?;
    encode_strict(target, &intermediate).map(|out| (out, target))
}

fn encode_strict(target: Encoding, intermediate: &str) -> Result<Vec<u8>, TextError> {
    let out = match target {
        Encoding::Utf8 => return Ok(intermediate.as_bytes().to_vec()),
        Encoding::Iso8859_1 => {
            let mut buf = Vec::with_capacity(intermediate.len());
            for c in intermediate.chars() {
                let cp = u32::from(c);
                if cp > 0xFF {
                    return Err(TextError::Unrepresentable);
                }
                buf.push(cp as u8);
            }
            buf
        }
        Encoding::Unknown => return Err(TextError::UnsupportedEncoding),
        _ => {
            let codec = target.codec().ok_or(TextError::UnsupportedEncoding)?;
            let (encoded, _, had_errors) = codec.encode(intermediate);
            if had_errors {
                return Err(TextError::Unrepresentable);
            }
            encoded.into_owned()
        }
    };

    // Round-trip check: never trust the encoder's error reporting alone.
    let verified = decode_strict(target, &out).map_err(|_| TextError::EncodeFailed)?;
    if verified != intermediate {
        return Err(TextError::Unrepresentable);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // "中文" in GBK
    const GBK_ZHONGWEN: &[u8] = &[0xD6, 0xD0, 0xCE, 0xC4];

    #[test]
    fn utf8_to_utf8_is_identity_iff_valid() {
        let src = "hello, 世界".as_bytes();
        let (out, enc) =
            strict_transcode(src, SourceEncoding::Named(Encoding::Utf8), Encoding::Utf8).unwrap();
        assert_eq!(out, src);
        assert_eq!(enc, Encoding::Utf8);

        let err = strict_transcode(
            &[0xFF, b'a'],
            SourceEncoding::Named(Encoding::Utf8),
            Encoding::Utf8,
        )
        .unwrap_err();
        assert_eq!(err, TextError::DecodeFailed);
    }

    #[test]
    fn gbk_to_utf8() {
        let (out, enc) = strict_transcode(
            GBK_ZHONGWEN,
            SourceEncoding::Named(Encoding::Gbk),
            Encoding::Utf8,
        )
        .unwrap();
        assert_eq!(out, "中文".as_bytes());
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn utf8_to_gbk_round_trips() {
        let (gbk, _) = strict_transcode(
            "中文,abc".as_bytes(),
            SourceEncoding::Named(Encoding::Utf8),
            Encoding::Gbk,
        )
        .unwrap();
        let (back, _) =
            strict_transcode(&gbk, SourceEncoding::Named(Encoding::Gbk), Encoding::Utf8).unwrap();
        assert_eq!(back, "中文,abc".as_bytes());
    }

    #[test]
    fn emoji_to_gbk_refuses() {
        let err = strict_transcode(
            "hello🙂".as_bytes(),
            SourceEncoding::Named(Encoding::Utf8),
            Encoding::Gbk,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TextError::Unrepresentable | TextError::EncodeFailed
        ));
    }

    #[test]
    fn emoji_to_gb18030_is_representable() {
        // GB18030 covers all of Unicode; this must not be rejected.
        let (out, _) = strict_transcode(
            "hi🙂".as_bytes(),
            SourceEncoding::Named(Encoding::Utf8),
            Encoding::Gb18030,
        )
        .unwrap();
        let (back, _) = strict_transcode(
            &out,
            SourceEncoding::Named(Encoding::Gb18030),
            Encoding::Utf8,
        )
        .unwrap();
        assert_eq!(back, "hi🙂".as_bytes());
    }

    #[test]
    fn non_latin1_to_iso_8859_1_refuses() {
        let err = strict_transcode(
            "中文".as_bytes(),
            SourceEncoding::Named(Encoding::Utf8),
            Encoding::Iso8859_1,
        )
        .unwrap_err();
        assert_eq!(err, TextError::Unrepresentable);
    }

    #[test]
    fn latin1_to_iso_8859_1_succeeds() {
        let (out, _) = strict_transcode(
            "caf\u{e9}".as_bytes(),
            SourceEncoding::Named(Encoding::Utf8),
            Encoding::Iso8859_1,
        )
        .unwrap();
        assert_eq!(out, &[b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn auto_source_rejects_binary() {
        let err = strict_transcode(
            &[0x00, 0x01, 0x02],
            SourceEncoding::Auto,
            Encoding::Utf8,
        )
        .unwrap_err();
        assert_eq!(err, TextError::NotText);
    }

    #[test]
    fn auto_source_resolves_gbk_text() {
        let (out, enc) =
            strict_transcode(GBK_ZHONGWEN, SourceEncoding::Auto, Encoding::Utf8).unwrap();
        assert_eq!(out, "中文".as_bytes());
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn unknown_labels_are_rejected() {
        assert_eq!(
            strict_transcode(b"x", SourceEncoding::Named(Encoding::Utf8), Encoding::Unknown)
                .unwrap_err(),
            TextError::UnsupportedEncoding
        );
        assert_eq!(
            strict_transcode(b"x", SourceEncoding::Named(Encoding::Unknown), Encoding::Utf8)
                .unwrap_err(),
            TextError::UnknownSource
        );
    }

    #[test]
    fn failed_transcode_returns_no_bytes() {
        let src = "hello🙂".as_bytes().to_vec();
        let before = src.clone();
        let result = strict_transcode(&src, SourceEncoding::Named(Encoding::Utf8), Encoding::Gbk);
        assert!(result.is_err());
        assert_eq!(src, before);
    }
}
