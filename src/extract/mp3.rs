//! Tag-stripping strategy for MPEG audio.
//!
//! Probes, in order, for a trailing ID3v1 tag, an extended ID3v1 tag in
//! front of it, and a leading ID3v2 tag, then digests the bytes between.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use super::digest::{PayloadDigest, digest_exact};
use super::tags::{
    AudioRange, ID3V1_EXTENDED_MARKER, ID3V1_EXTENDED_SIZE, ID3V1_MARKER, ID3V1_SIZE, read_at,
    read_id3v2_header,
};
use super::{ExtractError, open};

/// Digest the audio frames of an MP3 file, excluding ID3 tags.
pub fn extract(path: &Path) -> Result<PayloadDigest, ExtractError> {
    let mut file = open(path)?;
    let len = file
        .metadata()
        .map_err(|e| ExtractError::io(path, e))?
        .len();

    let range = audio_range(&mut file, len, path)?;
    digest_range(&mut file, range, path)
}

/// Digest the bytes of `range`.
pub fn digest_range<R: Read + Seek>(
    reader: &mut R,
    range: AudioRange,
    path: &Path,
) -> Result<PayloadDigest, ExtractError> {
    reader
        .seek(SeekFrom::Start(range.start))
        .map_err(|e| ExtractError::io(path, e))?;
    let digest = digest_exact(reader, range.len()).map_err(|e| ExtractError::io(path, e))?;
    debug!(target: "extract::mp3", path = %path.display(), %digest, "Payload digest computed");
    Ok(digest)
}

/// Locate the audio payload of a file of `len` bytes.
pub fn audio_range<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    path: &Path,
) -> Result<AudioRange, ExtractError> {
    if len < ID3V1_SIZE {
        return Err(ExtractError::truncated(
            path,
            format!("{len} bytes is below the {ID3V1_SIZE}-byte minimum for tag probing"),
        ));
    }

    let mut range = AudioRange::whole(len);
    let io = |e: std::io::Error| ExtractError::io(path, e);

    if probe_id3v1(reader, &mut range).map_err(io)? {
        debug!(target: "extract::mp3", path = %path.display(), end = range.end, "ID3v1 tag found");
        if probe_id3v1_extended(reader, &mut range).map_err(io)? {
            debug!(target: "extract::mp3", path = %path.display(), end = range.end, "ID3v1 extended tag found");
        }
    }

    if let Some(header) = read_id3v2_header(reader, len).map_err(io)? {
        let tag_end = header.total_size();
        if tag_end > range.end {
            return Err(ExtractError::truncated(
                path,
                format!(
                    "ID3v2.{} tag claims {} bytes but audio ends at {}",
                    header.major_version, tag_end, range.end
                ),
            ));
        }
        range.start = tag_end;
        debug!(
            target: "extract::mp3",
            path = %path.display(),
            version = header.major_version,
            footer = header.has_footer(),
            start = range.start,
            "ID3v2 tag found"
        );
    }

    if range.is_empty() {
        return Err(ExtractError::unsupported(path, "no audio payload between tags"));
    }

    debug!(target: "extract::mp3", path = %path.display(), start = range.start, end = range.end, "Audio range resolved");
    Ok(range)
}

/// Exclude a trailing ID3v1 tag. Caller guarantees `range.end >= 128`.
fn probe_id3v1<R: Read + Seek>(reader: &mut R, range: &mut AudioRange) -> std::io::Result<bool> {
    let offset = range.end - ID3V1_SIZE;
    let mut marker = [0u8; 3];
    read_at(reader, offset, &mut marker)?;
    if &marker == ID3V1_MARKER {
        range.end = offset;
        return Ok(true);
    }
    Ok(false)
}

/// Exclude an extended ID3v1 tag sitting directly before the ID3v1 tag.
fn probe_id3v1_extended<R: Read + Seek>(
    reader: &mut R,
    range: &mut AudioRange,
) -> std::io::Result<bool> {
    if range.end < ID3V1_EXTENDED_SIZE {
        return Ok(false);
    }
    let offset = range.end - ID3V1_EXTENDED_SIZE;
    let mut marker = [0u8; 4];
    read_at(reader, offset, &mut marker)?;
    if &marker == ID3V1_EXTENDED_MARKER {
        range.end = offset;
        return Ok(true);
    }
    Ok(false)
}
