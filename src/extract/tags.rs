//! ID3 tag layouts and the byte range they leave for audio.
//!
//! Only the fields needed to locate tag boundaries are decoded. Layouts
//! follow the id3.org ID3v1, ID3v1 extended and ID3v2.4 structure notes.

use std::io::{self, Read, Seek, SeekFrom};

/// Size of a trailing ID3v1 tag.
pub const ID3V1_SIZE: u64 = 128;
/// Size of an extended ID3v1 tag, stored directly before the ID3v1 tag.
pub const ID3V1_EXTENDED_SIZE: u64 = 227;
/// Size of the fixed ID3v2 header.
pub const ID3V2_HEADER_SIZE: u64 = 10;
/// Size of the optional ID3v2.4 footer.
pub const ID3V2_FOOTER_SIZE: u64 = 10;

pub const ID3V1_MARKER: &[u8; 3] = b"TAG";
pub const ID3V1_EXTENDED_MARKER: &[u8; 4] = b"TAG+";
pub const ID3V2_MARKER: &[u8; 3] = b"ID3";

/// Header flag bit announcing a footer.
const ID3V2_FLAG_FOOTER: u8 = 1 << 4;

/// Byte offsets of the audio payload within a file, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioRange {
    pub start: u64,
    pub end: u64,
}

impl AudioRange {
    /// Range covering a whole file of `len` bytes.
    pub fn whole(len: u64) -> Self {
        Self { start: 0, end: len }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode a synchsafe integer: four bytes carrying 7 bits each, MSB first.
///
/// The top bit of every byte is reserved; it is masked off rather than
/// trusted, so the result is always below 2^28.
pub fn decode_synchsafe(bytes: [u8; 4]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, b| (acc << 7) | u32::from(b & 0x7f))
}

/// The fixed 10-byte ID3v2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id3v2Header {
    pub major_version: u8,
    pub revision: u8,
    pub flags: u8,
    /// Tag body size, excluding header and footer
    pub size: u32,
}

impl Id3v2Header {
    /// Parse a header, or `None` if the `ID3` marker is absent.
    pub fn parse(bytes: &[u8; 10]) -> Option<Self> {
        if &bytes[..3] != ID3V2_MARKER {
            return None;
        }
        Some(Self {
            major_version: bytes[3],
            revision: bytes[4],
            flags: bytes[5],
            size: decode_synchsafe([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }

    pub fn has_footer(&self) -> bool {
        self.flags & ID3V2_FLAG_FOOTER != 0
    }

    /// Bytes occupied by the whole tag: header, body and optional footer.
    pub fn total_size(&self) -> u64 {
        let footer = if self.has_footer() { ID3V2_FOOTER_SIZE } else { 0 };
        ID3V2_HEADER_SIZE + u64::from(self.size) + footer
    }
}

/// Fill `buf` from absolute `offset`.
pub fn read_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)
}

/// Read the ID3v2 header at offset 0, if the file is long enough to hold one.
pub fn read_id3v2_header<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Option<Id3v2Header>> {
    if len < ID3V2_HEADER_SIZE {
        return Ok(None);
    }
    let mut header = [0u8; 10];
    read_at(reader, 0, &mut header)?;
    Ok(Id3v2Header::parse(&header))
}
