//! Declared-signature strategy for FLAC.
//!
//! FLAC encoders store an MD5 of the unencoded audio in the STREAMINFO
//! block, which must be the first metadata block after the `fLaC` marker.
//! The signature is returned as-is without decoding audio. Streams whose
//! encoder left the signature unset are decoded and digested instead, and
//! [`verify`] decodes any stream to check its frames against the signature.

use std::io::{Read, Seek};
use std::path::Path;
use tracing::{debug, warn};

use super::digest::PayloadDigest;
use super::pcm::decoded_digest;
use super::tags::{read_at, read_id3v2_header};
use super::{ExtractError, open};

const FLAC_MARKER: &[u8; 4] = b"fLaC";
const BLOCK_HEADER_SIZE: u64 = 4;
const STREAMINFO_TYPE: u8 = 0;
const STREAMINFO_SIZE: u64 = 34;
/// Offset of the 16-byte MD5 signature within STREAMINFO.
const SIGNATURE_OFFSET: usize = 18;

/// Declared and decoded digests of one FLAC stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlacCheck {
    /// STREAMINFO signature, `None` when the encoder left it unset
    pub declared: Option<PayloadDigest>,
    /// Digest of the decoded samples
    pub decoded: PayloadDigest,
}

impl FlacCheck {
    /// Whether the frames decode to the declared signature.
    /// An unset signature has nothing to disagree with.
    pub fn is_consistent(&self) -> bool {
        self.declared.is_none_or(|declared| declared == self.decoded)
    }
}

/// Return the STREAMINFO signature of a FLAC file.
///
/// An all-zero signature means the encoder never computed one; the decoded
/// audio is digested in its place.
pub fn extract(path: &Path) -> Result<PayloadDigest, ExtractError> {
    match declared_signature(path)? {
        Some(digest) => {
            debug!(target: "extract::flac", path = %path.display(), %digest, "STREAMINFO signature read");
            Ok(digest)
        }
        None => {
            debug!(target: "extract::flac", path = %path.display(), "STREAMINFO signature unset, decoding audio");
            decoded_digest(path)
        }
    }
}

/// Decode a FLAC file and compare its audio with the declared signature.
pub fn verify(path: &Path) -> Result<FlacCheck, ExtractError> {
    let declared = declared_signature(path)?;
    let decoded = decoded_digest(path)?;
    let check = FlacCheck { declared, decoded };
    if !check.is_consistent() {
        warn!(target: "extract::flac", path = %path.display(), ?declared, %decoded, "Decoded audio disagrees with STREAMINFO");
    }
    Ok(check)
}

fn declared_signature(path: &Path) -> Result<Option<PayloadDigest>, ExtractError> {
    let mut file = open(path)?;
    let len = file
        .metadata()
        .map_err(|e| ExtractError::io(path, e))?
        .len();

    let digest = read_signature(&mut file, len, path)?;
    Ok((!digest.is_zero()).then_some(digest))
}

/// Parse the declared signature from a reader holding `len` bytes.
///
/// Returns the raw bytes, including an all-zero (unset) signature.
pub fn read_signature<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    path: &Path,
) -> Result<PayloadDigest, ExtractError> {
    let io = |e: std::io::Error| ExtractError::io(path, e);

    // Some taggers prepend ID3v2 to FLAC streams
    let start = match read_id3v2_header(reader, len).map_err(io)? {
        Some(header) => {
            debug!(target: "extract::flac", path = %path.display(), skip = header.total_size(), "Skipping leading ID3v2 tag");
            header.total_size()
        }
        None => 0,
    };

    if len < start + FLAC_MARKER.len() as u64 {
        return Err(ExtractError::truncated(path, "too short for the fLaC marker"));
    }
    let mut marker = [0u8; 4];
    read_at(reader, start, &mut marker).map_err(io)?;
    if &marker != FLAC_MARKER {
        return Err(ExtractError::unsupported(path, "missing fLaC stream marker"));
    }

    let block_start = start + FLAC_MARKER.len() as u64;
    if len < block_start + BLOCK_HEADER_SIZE + STREAMINFO_SIZE {
        return Err(ExtractError::truncated(path, "too short for a STREAMINFO block"));
    }

    let mut block_header = [0u8; 4];
    read_at(reader, block_start, &mut block_header).map_err(io)?;
    let block_type = block_header[0] & 0x7f;
    let block_len = u32::from_be_bytes([0, block_header[1], block_header[2], block_header[3]]);
    if block_type != STREAMINFO_TYPE {
        return Err(ExtractError::unsupported(
            path,
            format!("first metadata block has type {block_type}, expected STREAMINFO"),
        ));
    }
    if u64::from(block_len) != STREAMINFO_SIZE {
        return Err(ExtractError::unsupported(
            path,
            format!("STREAMINFO block is {block_len} bytes, expected {STREAMINFO_SIZE}"),
        ));
    }

    let mut streaminfo = [0u8; STREAMINFO_SIZE as usize];
    read_at(reader, block_start + BLOCK_HEADER_SIZE, &mut streaminfo).map_err(io)?;

    let mut signature = [0u8; 16];
    signature.copy_from_slice(&streaminfo[SIGNATURE_OFFSET..]);
    Ok(PayloadDigest::from_bytes(signature))
}
