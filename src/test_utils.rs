//! Test utilities and fixtures for music-audit tests.
//!
//! This module provides byte-level builders for FLAC and MP3 files, paths
//! to the checked-in fixtures under `tests/good/`, and store helpers to
//! reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use music_audit::test_utils::{temp_store, write_file, mp3_payload, id3v1_tag};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (mut store, dir) = temp_store().await;
//!     let path = write_file(dir.path(), "a.mp3", &[mp3_payload(), id3v1_tag()].concat());
//!     // ... test logic
//! }
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::store::ChecksumStore;

/// STREAMINFO signature of `tests/good/track.flac`.
pub const GOOD_FLAC_SIGNATURE: &str = "000a1b2c3d4e5f60718293a4b5c6d7e8";

/// MD5 of the decoded samples of `tests/good/verbatim.flac`, which is also
/// its declared STREAMINFO signature.
pub const VERBATIM_FLAC_PCM_DIGEST: &str = "46c7a96f6367ca14ab5704c8b36341c9";

/// Byte range of the STREAMINFO signature in fixtures without leading tags.
pub const FLAC_SIGNATURE_RANGE: std::ops::Range<usize> = 26..42;

/// MD5 of [`mp3_payload`], shared by every MP3 fixture in `tests/good/`.
pub const GOOD_MP3_PAYLOAD_DIGEST: &str = "17ffab836326fb7c3c8fd81626477d9f";

/// Path to a checked-in fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("good")
        .join(name)
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("Failed to write test file");
    path
}

/// Creates a checksum store in a fresh temporary directory.
///
/// Keep the TempDir alive for the duration of your test; the store and
/// its sidecar are deleted when it goes out of scope.
pub async fn temp_store() -> (ChecksumStore, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let store = ChecksumStore::open(&dir.path().join("test.db"), true)
        .await
        .expect("Failed to initialize test store");
    (store, dir)
}

/// Fake MPEG audio: one frame header followed by deterministic filler.
///
/// Matches the payload embedded in the `tests/good/*.mp3` fixtures.
pub fn mp3_payload() -> Vec<u8> {
    let mut bytes = vec![0xff, 0xfb, 0x90, 0x64];
    bytes.extend((0..1040u32).map(|i| ((i * 31 + 5) % 256) as u8));
    bytes
}

fn padded(text: &[u8], width: usize) -> Vec<u8> {
    let mut field = text.to_vec();
    field.resize(width, 0);
    field
}

/// A 128-byte ID3v1 tag.
pub fn id3v1_tag() -> Vec<u8> {
    let tag = [
        b"TAG".to_vec(),
        padded(b"Title", 30),
        padded(b"Artist", 30),
        padded(b"Album", 30),
        b"2001".to_vec(),
        padded(b"comment", 30),
        vec![12],
    ]
    .concat();
    assert_eq!(tag.len(), 128);
    tag
}

/// A 227-byte extended ID3v1 tag.
pub fn id3v1_extended_tag() -> Vec<u8> {
    let tag = [
        b"TAG+".to_vec(),
        padded(b"Longer Title", 60),
        padded(b"Longer Artist", 60),
        padded(b"Longer Album", 60),
        vec![0],
        padded(b"Rock", 30),
        b"000:00".to_vec(),
        b"000:00".to_vec(),
    ]
    .concat();
    assert_eq!(tag.len(), 227);
    tag
}

fn encode_synchsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7f) as u8,
        ((value >> 14) & 0x7f) as u8,
        ((value >> 7) & 0x7f) as u8,
        (value & 0x7f) as u8,
    ]
}

/// An ID3v2.4 tag with a `body_len`-byte body and an optional footer.
pub fn id3v2_tag(body_len: u32, footer: bool) -> Vec<u8> {
    let flags = if footer { 0x10 } else { 0x00 };
    let size = encode_synchsafe(body_len);

    let mut tag = b"ID3".to_vec();
    tag.extend([4, 0, flags]);
    tag.extend(size);
    tag.resize(10 + body_len as usize, 0);
    if footer {
        tag.extend(b"3DI");
        tag.extend([4, 0, flags]);
        tag.extend(size);
    }
    tag
}

/// A minimal FLAC stream: marker, STREAMINFO carrying `signature`, one frame.
pub fn flac_bytes(signature: u128) -> Vec<u8> {
    let mut bytes = b"fLaC".to_vec();
    // last-metadata-block flag, type 0 (STREAMINFO), length 34
    bytes.extend([0x80, 0x00, 0x00, 0x22]);
    bytes.extend(4096u16.to_be_bytes());
    bytes.extend(4096u16.to_be_bytes());
    bytes.extend([0u8; 6]);
    // 44.1 kHz, stereo, 16 bits, 44100 samples
    let packed: u64 = (44_100 << 44) | (1 << 41) | (15 << 36) | 44_100;
    bytes.extend(packed.to_be_bytes());
    bytes.extend(signature.to_be_bytes());
    bytes.extend([0xff, 0xf8, 0x69, 0x08]);
    bytes.extend((0..512u32).map(|i| ((i * 7) % 251) as u8));
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_match_fixtures() {
        let expected = [mp3_payload(), id3v1_tag()].concat();
        assert_eq!(std::fs::read(fixture_path("id3v1.mp3")).unwrap(), expected);

        let signature = u128::from_str_radix(GOOD_FLAC_SIGNATURE, 16).unwrap();
        assert_eq!(
            std::fs::read(fixture_path("track.flac")).unwrap(),
            flac_bytes(signature)
        );
    }

    #[test]
    fn test_id3v2_tag_layout() {
        assert_eq!(id3v2_tag(300, false).len(), 310);
        assert_eq!(&id3v2_tag(300, false)[6..10], &[0x00, 0x00, 0x02, 0x2c]);
        assert_eq!(id3v2_tag(200, true).len(), 220);
    }
}
