//! Decoded-audio digest for FLAC.
//!
//! Decodes every frame and hashes the samples the way FLAC encoders compute
//! the STREAMINFO signature: interleaved, signed little-endian, each sample
//! stored in the smallest whole number of bytes that holds its bit depth.
//! A stream whose frames were damaged after encoding decodes to a digest
//! that no longer matches its declared signature.

use md5::{Digest, Md5};
use std::io;
use std::path::Path;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::digest::PayloadDigest;
use super::{ExtractError, open};

/// Decode the audio of a FLAC file and digest its PCM samples.
pub fn decoded_digest(path: &Path) -> Result<PayloadDigest, ExtractError> {
    let file = open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("flac");

    let opened = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_error(path, e))?;
    let mut reader = opened.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ExtractError::unsupported(path, "no audio track found"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let bits = codec_params
        .bits_per_sample
        .ok_or_else(|| ExtractError::unsupported(path, "unknown bits per sample"))?;
    let width = sample_width(bits)
        .ok_or_else(|| ExtractError::unsupported(path, format!("unsupported bit depth {bits}")))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(path, e))?;

    let mut hasher = Md5::new();
    let mut frames = 0u64;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(decode_error(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        // A frame that fails to decode is damage, not something to skip
        let decoded = decoder.decode(&packet).map_err(|e| decode_error(path, e))?;
        let AudioBufferRef::S32(buffer) = decoded else {
            return Err(ExtractError::unsupported(path, "decoder produced non-integer samples"));
        };
        frames += hash_interleaved(&mut hasher, &buffer, bits, width);
    }

    if frames == 0 {
        return Err(ExtractError::unsupported(path, "no audio frames decoded"));
    }
    if let Some(expected) = codec_params.n_frames {
        if expected != frames {
            return Err(ExtractError::truncated(
                path,
                format!("decoded {frames} of {expected} samples per channel"),
            ));
        }
    }

    let digest = PayloadDigest::from_bytes(hasher.finalize().into());
    debug!(target: "extract::flac", path = %path.display(), frames, %digest, "Decoded audio digest computed");
    Ok(digest)
}

/// Bytes per sample in the signature input, for a given bit depth.
fn sample_width(bits: u32) -> Option<usize> {
    match bits {
        1..=8 => Some(1),
        9..=16 => Some(2),
        17..=24 => Some(3),
        25..=32 => Some(4),
        _ => None,
    }
}

/// Feed one decoded block to the hasher. Returns the block's frame count.
///
/// Decoded samples arrive scaled to the full 32-bit range and are shifted
/// back to their encoded bit depth first.
fn hash_interleaved(hasher: &mut Md5, buffer: &AudioBuffer<i32>, bits: u32, width: usize) -> u64 {
    let shift = 32 - bits;
    let planes = buffer.planes();
    let mut bytes = Vec::with_capacity(buffer.frames() * planes.planes().len() * width);

    for frame in 0..buffer.frames() {
        for plane in planes.planes() {
            let sample = plane[frame] >> shift;
            bytes.extend_from_slice(&sample.to_le_bytes()[..width]);
        }
    }

    hasher.update(&bytes);
    buffer.frames() as u64
}

fn decode_error(path: &Path, err: SymphoniaError) -> ExtractError {
    match err {
        SymphoniaError::IoError(e) => ExtractError::io(path, e),
        other => ExtractError::unsupported(path, format!("cannot decode audio: {other}")),
    }
}
