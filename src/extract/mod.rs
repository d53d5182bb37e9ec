//! Audio payload extraction.
//!
//! Isolates the audio payload of a file from its metadata and produces a
//! [`PayloadDigest`] that is stable across tag edits.
//!
//! # Overview
//!
//! Each [`Format`] maps to one [`Extractor`] strategy:
//! - [`Extractor::DeclaredSignature`]: the container declares a signature of
//!   its own audio (FLAC STREAMINFO), which is returned directly; an unset
//!   signature falls back to digesting the decoded samples
//! - [`Extractor::TagStripping`]: leading and trailing ID3 tags are located
//!   and excluded, and the remaining bytes are digested (MP3)
//!
//! # Example
//!
//! ```ignore
//! use music_audit::extract::extract;
//! use music_audit::model::Format;
//!
//! let digest = extract(Path::new("song.mp3"), Format::Mp3)?;
//! println!("{digest}");
//! ```
//!
//! [`verify_flac`] decodes a FLAC stream and compares its samples with the
//! declared signature, catching frames damaged after encoding.

mod digest;
mod flac;
mod mp3;
mod pcm;
mod tags;

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::Format;

pub use digest::{ParseDigestError, PayloadDigest};
pub use flac::{FlacCheck, verify as verify_flac};

/// Payload extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Return the signature declared in the format's metadata block
    DeclaredSignature,
    /// Digest the bytes left after stripping leading and trailing tags
    TagStripping,
}

impl Extractor {
    /// Compute the payload digest of the file at `path`.
    pub fn extract(&self, path: &Path) -> Result<PayloadDigest, ExtractError> {
        match self {
            Extractor::DeclaredSignature => flac::extract(path),
            Extractor::TagStripping => mp3::extract(path),
        }
    }
}

/// Compute the payload digest of `path` using the strategy for `format`.
pub fn extract(path: &Path, format: Format) -> Result<PayloadDigest, ExtractError> {
    format.extractor().extract(path)
}

/// Reasons a payload digest could not be produced.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// File does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File lacks the expected metadata or tag structure
    #[error("Unsupported file {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },

    /// File is too small for the structure it claims to contain
    #[error("Truncated file {}: {reason}", path.display())]
    Truncated { path: PathBuf, reason: String },

    /// Any other read failure
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    pub fn unsupported(path: &Path, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn truncated(path: &Path, reason: impl Into<String>) -> Self {
        Self::Truncated {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Classify an IO error; missing files and short reads get their own kinds.
    pub fn io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::UnexpectedEof => Self::truncated(path, source.to_string()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Open a file for extraction. The handle lives only as long as the call.
fn open(path: &Path) -> Result<File, ExtractError> {
    File::open(path).map_err(|e| ExtractError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{GOOD_FLAC_SIGNATURE, GOOD_MP3_PAYLOAD_DIGEST, fixture_path};

    #[test]
    fn test_both_strategies_render_same_width() {
        let flac = extract(&fixture_path("track.flac"), Format::Flac).unwrap();
        let mp3 = extract(&fixture_path("id3v1.mp3"), Format::Mp3).unwrap();
        assert_eq!(flac.to_hex(), GOOD_FLAC_SIGNATURE);
        assert_eq!(mp3.to_hex(), GOOD_MP3_PAYLOAD_DIGEST);
        for hex in [flac.to_hex(), mp3.to_hex()] {
            assert_eq!(hex.len(), 32);
            assert_eq!(hex, hex.to_lowercase());
        }
    }

    #[test]
    fn test_wrong_strategy_for_file() {
        let err = extract(&fixture_path("id3v1.mp3"), Format::Flac).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported { .. }));
    }

    #[test]
    fn test_not_found() {
        for format in Format::ALL {
            let err = extract(Path::new("missing/file.bin"), format).unwrap_err();
            assert!(matches!(err, ExtractError::NotFound(_)), "{format}");
        }
    }

    #[test]
    fn test_error_display_names_path() {
        let err = ExtractError::truncated(Path::new("/music/a.mp3"), "short");
        assert!(err.to_string().contains("/music/a.mp3"));
    }
}
