//! Payload digest value and streaming computation.
//!
//! Every strategy produces a [`PayloadDigest`]: 128 bits rendered as exactly
//! 32 lowercase hex characters. Leading zero nibbles are significant and are
//! never dropped from the text form.

use md5::{Digest, Md5};
use std::io::{self, Read};

/// Read buffer for streaming digests.
const CHUNK_SIZE: usize = 64 * 1024;

/// A 128-bit audio payload digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadDigest([u8; 16]);

impl PayloadDigest {
    /// Wrap raw digest bytes (big-endian, as they appear on disk).
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// True when every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Lowercase, zero-padded 32-character hex form.
    pub fn to_hex(&self) -> String {
        format!("{:032x}", u128::from_be_bytes(self.0))
    }
}

impl From<u128> for PayloadDigest {
    fn from(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

impl std::fmt::Display for PayloadDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Error parsing a stored digest string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a 32-character lowercase hex digest: {0:?}")]
pub struct ParseDigestError(pub String);

impl std::str::FromStr for PayloadDigest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == 32
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(ParseDigestError(s.to_string()));
        }
        u128::from_str_radix(s, 16)
            .map(Self::from)
            .map_err(|_| ParseDigestError(s.to_string()))
    }
}

/// Digest exactly `len` bytes from `reader`.
///
/// Fails with [`io::ErrorKind::UnexpectedEof`] if the reader runs dry first.
pub fn digest_exact<R: Read>(reader: &mut R, len: u64) -> io::Result<PayloadDigest> {
    let mut hasher = Md5::new();
    let mut remaining = len;
    let mut buffer = vec![0u8; CHUNK_SIZE];

    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let read = match reader.read(&mut buffer[..want]) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload ended {remaining} bytes early"),
            ));
        }
        hasher.update(&buffer[..read]);
        remaining -= read as u64;
    }

    Ok(PayloadDigest::from_bytes(hasher.finalize().into()))
}
