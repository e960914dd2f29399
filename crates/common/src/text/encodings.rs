use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Closed set of charset labels the service understands.
///
/// `Unknown` marks content that did not classify as text; it is never a
/// valid transcode source or target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Utf8,
    Gb18030,
    Gbk,
    Big5,
    Windows1252,
    Iso8859_1,
    Unknown,
}

/// Sentinel accepted by the source-encoding selector.
pub const SOURCE_AUTO: &str = "auto";

impl Encoding {
    pub const fn label(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Gb18030 => "GB18030",
            Encoding::Gbk => "GBK",
            Encoding::Big5 => "Big5",
            Encoding::Windows1252 => "Windows-1252",
            Encoding::Iso8859_1 => "ISO-8859-1",
            Encoding::Unknown => "Unknown",
        }
    }

    /// The target-encoding list, in the order it is offered to users.
    pub const fn targets() -> [Encoding; 6] {
        [
            Encoding::Utf8,
            Encoding::Gb18030,
            Encoding::Gbk,
            Encoding::Big5,
            Encoding::Windows1252,
            Encoding::Iso8859_1,
        ]
    }

    /// Backing encoding_rs codec. `Utf8` and `Iso8859_1` are handled
    /// directly (encoding_rs aliases latin1 to Windows-1252, which is not
    /// the byte-transparent ISO-8859-1 this service promises).
    pub(crate) fn codec(self) -> Option<&'static encoding_rs::Encoding> {
        match self {
            Encoding::Gb18030 => Some(encoding_rs::GB18030),
            Encoding::Gbk => Some(encoding_rs::GBK),
            Encoding::Big5 => Some(encoding_rs::BIG5),
            Encoding::Windows1252 => Some(encoding_rs::WINDOWS_1252),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Encoding {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "UTF-8" => Ok(Encoding::Utf8),
            "GB18030" => Ok(Encoding::Gb18030),
            "GBK" => Ok(Encoding::Gbk),
            "Big5" => Ok(Encoding::Big5),
            "Windows-1252" => Ok(Encoding::Windows1252),
            "ISO-8859-1" => Ok(Encoding::Iso8859_1),
            "Unknown" => Ok(Encoding::Unknown),
            _ => Err(()),
        }
    }
}

impl Serialize for Encoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Encoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown encoding label {s:?}")))
    }
}

/// What a transcode request names as its source: a concrete encoding, or
/// `auto` to let detection decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Auto,
    Named(Encoding),
}

impl SourceEncoding {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s == SOURCE_AUTO {
            return Some(SourceEncoding::Auto);
        }
        s.parse().ok().map(SourceEncoding::Named)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for enc in Encoding::targets() {
            assert_eq!(enc.label().parse::<Encoding>(), Ok(enc));
        }
        assert_eq!("Unknown".parse::<Encoding>(), Ok(Encoding::Unknown));
        assert!("KOI8-R".parse::<Encoding>().is_err());
    }

    #[test]
    fn target_order_is_fixed() {
        let labels: Vec<_> = Encoding::targets().iter().map(|e| e.label()).collect();
        assert_eq!(
            labels,
            ["UTF-8", "GB18030", "GBK", "Big5", "Windows-1252", "ISO-8859-1"]
        );
    }

    #[test]
    fn source_selector_accepts_auto_and_empty() {
        assert_eq!(SourceEncoding::parse("auto"), Some(SourceEncoding::Auto));
        assert_eq!(SourceEncoding::parse(""), Some(SourceEncoding::Auto));
        assert_eq!(
            SourceEncoding::parse("GBK"),
            Some(SourceEncoding::Named(Encoding::Gbk))
        );
        assert_eq!(SourceEncoding::parse("EBCDIC"), None);
    }
}
