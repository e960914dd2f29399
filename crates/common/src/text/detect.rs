//! Conservative text detection.
//!
//! The detector answers one question: is it safe to offer transcoding for
//! this buffer? The policy prefers "no" over misclassifying binary data,
//! so transcoding still re-validates the full input with strict decoding.

use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

use super::encodings::Encoding;
use super::TextError;

/// Only the first 64 KiB participate in classification.
const MAX_DETECT_SAMPLE_BYTES: usize = 64 * 1024;

/// Any NUL byte in the sample marks the buffer as binary.
const MAX_NUL_ALLOWED: usize = 0;

/// Control characters (other than \t \n \r) above this share mark binary.
const MAX_BAD_CONTROL_RATIO: f64 = 0.01;

/// Printable-rune share required of multi-byte candidates.
const MIN_PRINTABLE_RATIO: f64 = 0.95;

/// Single-byte encodings decode every byte sequence to *something*, so they
/// get a stricter bar to keep binary data from passing as Western text.
const MIN_PRINTABLE_RATIO_SINGLE_BYTE: f64 = 0.98;
const MIN_TEXT_RUNES_SINGLE_BYTE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub is_text: bool,
    pub encoding: Encoding,
}

const NOT_TEXT: Detection = Detection {
    is_text: false,
    encoding: Encoding::Unknown,
};

/// Classifies a byte buffer as recognizable text (and its most likely
/// encoding) or not. Candidates are tried in a fixed order; the first
/// strict decode that clears its printable threshold wins.
pub fn detect(bytes: &[u8]) -> Detection {
    let sample = &bytes[..bytes.len().min(MAX_DETECT_SAMPLE_BYTES)];

    if looks_binary(sample) {
        return NOT_TEXT;
    }

    if let Ok(s) = std::str::from_utf8(sample) {
        let (ratio, _) = printable_stats(s);
        if ratio >= MIN_PRINTABLE_RATIO {
            return Detection {
                is_text: true,
                encoding: Encoding::Utf8,
            };
        }
    }

    let candidates = [
        (Encoding::Gb18030, MIN_PRINTABLE_RATIO, 0),
        (Encoding::Gbk, MIN_PRINTABLE_RATIO, 0),
        (Encoding::Big5, MIN_PRINTABLE_RATIO, 0),
        (
            Encoding::Windows1252,
            MIN_PRINTABLE_RATIO_SINGLE_BYTE,
            MIN_TEXT_RUNES_SINGLE_BYTE,
        ),
        (
            Encoding::Iso8859_1,
            MIN_PRINTABLE_RATIO_SINGLE_BYTE,
            MIN_TEXT_RUNES_SINGLE_BYTE,
        ),
    ];
    for (encoding, min_ratio, min_runes) in candidates {
        if try_candidate(sample, encoding, min_ratio, min_runes) {
            return Detection {
                is_text: true,
                encoding,
            };
        }
    }

    NOT_TEXT
}

fn looks_binary(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return true;
    }

    let mut nul = 0usize;
    let mut bad_ctrl = 0usize;
    for &c in sample {
        match c {
            0x00 => {
                nul += 1;
                if nul > MAX_NUL_ALLOWED {
                    return true;
                }
            }
            b'\t' | b'\n' | b'\r' => {}
            c if c < 0x20 || c == 0x7F => bad_ctrl += 1,
            _ => {}
        }
    }

    bad_ctrl as f64 / sample.len() as f64 > MAX_BAD_CONTROL_RATIO
}

fn try_candidate(sample: &[u8], encoding: Encoding, min_ratio: f64, min_runes: usize) -> bool {
    let decoded = match decode_strict(encoding, sample) {
        Ok(s) => s,
        Err(_) => return false,
    };
    if decoded.contains('\u{FFFD}') {
        return false;
    }

    let (ratio, runes) = printable_stats(&decoded);
    runes > 0 && ratio >= min_ratio && (min_runes == 0 || runes >= min_runes)
}

/// Share of decoded code points that are printable (plus \t \n \r), and the
/// total decoded code point count.
fn printable_stats(s: &str) -> (f64, usize) {
    let mut printable = 0usize;
    let mut runes = 0usize;
    for c in s.chars() {
        runes += 1;
        if matches!(c, '\t' | '\n' | '\r') || is_printable(c) {
            printable += 1;
        }
    }
    if runes == 0 {
        return (0.0, 0);
    }
    (printable as f64 / runes as f64, runes)
}

/// Letters, marks, numbers, punctuation, symbols, and the ASCII space.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    matches!(
        c.general_category_group(),
        GeneralCategoryGroup::Letter
            | GeneralCategoryGroup::Mark
            | GeneralCategoryGroup::Number
            | GeneralCategoryGroup::Punctuation
            | GeneralCategoryGroup::Symbol
    )
}

/// Decodes `src` under `encoding`, failing closed on any byte sequence the
/// decoder cannot map exactly.
pub(crate) fn decode_strict(encoding: Encoding, src: &[u8]) -> Result<String, TextError> {
    match encoding {
        Encoding::Utf8 => std::str::from_utf8(src)
            .map(str::to_owned)
            .map_err(|_| TextError::DecodeFailed),
        // ISO-8859-1 is the identity mapping onto U+0000..U+00FF.
        Encoding::Iso8859_1 => Ok(src.iter().map(|&b| char::from(b)).collect()),
        Encoding::Unknown => Err(TextError::UnsupportedEncoding),
        _ => {
            let codec = encoding.codec().ok_or(TextError::UnsupportedEncoding)?;
            codec
                .decode_without_bom_handling_and_without_replacement(src)
                .map(|cow| cow.into_owned())
                .ok_or(TextError::DecodeFailed)
        }
    }
}
