//! Core data models for the checksum store.
//!
//! Defines the supported audio [`Format`]s and the persisted
//! [`ChecksumRecord`] entity.
//!
//! # Database Schema
//!
//! The models map to the following table:
//! - `checksums` - One payload digest per file path

use lofty::file::FileType;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::Path;

use crate::extract::Extractor;

/// Audio formats with a payload extraction strategy.
///
/// New formats are added here and wired to an [`Extractor`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// FLAC, digest taken from the STREAMINFO signature
    Flac,
    /// MPEG layer 3, digest computed over the frames between ID3 tags
    Mp3,
}

impl Format {
    /// Every supported format, in processing order.
    pub const ALL: [Format; 2] = [Format::Flac, Format::Mp3];

    /// Convert to string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Flac => "flac",
            Format::Mp3 => "mp3",
        }
    }

    /// The extraction strategy used for this format.
    pub fn extractor(&self) -> Extractor {
        match self {
            Format::Flac => Extractor::DeclaredSignature,
            Format::Mp3 => Extractor::TagStripping,
        }
    }

    /// Map a lofty file type onto a supported format.
    pub fn from_file_type(file_type: FileType) -> Option<Self> {
        match file_type {
            FileType::Flac => Some(Format::Flac),
            FileType::Mpeg => Some(Format::Mp3),
            _ => None,
        }
    }

    /// Infer the format from a path's extension (case-insensitive).
    ///
    /// Only the literal `flac` and `mp3` extensions count; lofty also maps
    /// `mp1`/`mp2` to MPEG, but those layers are not MP3 streams.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flac" => Ok(Format::Flac),
            "mp3" => Ok(Format::Mp3),
            other => Err(format!("unsupported format '{other}'")),
        }
    }
}

/// A persisted payload checksum.
#[derive(Debug, Clone, FromRow)]
pub struct ChecksumRecord {
    /// File path (unique)
    pub path: String,
    /// 32-character lowercase hex digest
    pub digest: String,
    /// Format tag of the strategy that produced the digest
    pub format: String,
    /// RFC 3339 timestamp of first insertion
    pub recorded_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_roundtrip() {
        for format in Format::ALL {
            assert_eq!(format.as_str().parse::<Format>().unwrap(), format);
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/b.flac")), Some(Format::Flac));
        assert_eq!(Format::from_path(Path::new("B.MP3")), Some(Format::Mp3));
        assert_eq!(Format::from_path(Path::new("notes.txt")), None);
        assert_eq!(Format::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn test_other_mpeg_layers_not_mp3() {
        assert_eq!(Format::from_path(Path::new("old.mp2")), None);
        assert_eq!(Format::from_path(Path::new("older.MP1")), None);
        assert_eq!(Format::from_path(Path::new("a.mpga")), None);
    }

    #[test]
    fn test_format_selects_extractor() {
        assert_eq!(Format::Flac.extractor(), Extractor::DeclaredSignature);
        assert_eq!(Format::Mp3.extractor(), Extractor::TagStripping);
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!("ogg".parse::<Format>().is_err());
    }
}
