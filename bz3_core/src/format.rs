use log::warn;
use serde::Serialize;

use crate::error::{Error, Result};

/// Signature opening every BZ3v1 stream header.
pub const SIGNATURE: &[u8; 5] = b"BZ3v1";

/// Smallest accepted block size: 65 KiB.
pub const BLOCKSIZE_MIN: u32 = 65 << 10;

/// Largest accepted block size: 511 MiB.
pub const BLOCKSIZE_MAX: u32 = 511 << 20;

/// Block size used when the caller does not configure one: 16 MiB.
pub const DEFAULT_BLOCK_SIZE: u32 = 16 << 20;

/// File-format header: signature[5] + block_size:u32 = 9 bytes.
pub const FILE_HEADER_LEN: usize = 9;

/// Frame-format header: signature[5] + block_size:u32 + block_count:u32 = 13 bytes.
pub const FRAME_HEADER_LEN: usize = 13;

/// Block sub-header: packed_size:u32 + original_size:u32 = 8 bytes.
pub const BLOCK_HEADER_LEN: usize = 8;

/// Header variant of a container.
///
/// `File` streams are open-ended and run until end-of-input or the next
/// header. `Frame` streams carry a block count, so truncation is detected
/// exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Format {
    #[default]
    File = 1,
    Frame = 2,
}

impl Format {
    /// Size in bytes of this variant's stream header.
    pub fn header_len(self) -> usize {
        match self {
            Format::File => FILE_HEADER_LEN,
            Format::Frame => FRAME_HEADER_LEN,
        }
    }
}

impl TryFrom<u8> for Format {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Format::File),
            2 => Ok(Format::Frame),
            other => Err(Error::InitError(format!("unknown format tag {}", other))),
        }
    }
}

/// Normalize a configured block size.
///
/// Values below [`BLOCKSIZE_MIN`] are raised to the minimum; values above
/// [`BLOCKSIZE_MAX`] are rejected.
pub fn clamp_block_size(block_size: u32) -> Result<u32> {
    if block_size < BLOCKSIZE_MIN {
        warn!(
            "block size {} is below the minimum, using {} instead",
            block_size, BLOCKSIZE_MIN
        );
        Ok(BLOCKSIZE_MIN)
    } else if block_size > BLOCKSIZE_MAX {
        Err(Error::InitError(format!(
            "block size {} out of range (expected {}..={})",
            block_size, BLOCKSIZE_MIN, BLOCKSIZE_MAX
        )))
    } else {
        Ok(block_size)
    }
}

#[inline]
pub(crate) fn load_u32_le(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

// ── Stream header ──────────────────────────────────────────────────────────

/// Decoded stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamHeader {
    /// Largest original size any block of this segment may have.
    pub block_size: u32,
    /// Number of blocks in the segment; present only in frame format.
    pub block_count: Option<u32>,
}

impl StreamHeader {
    pub fn file(block_size: u32) -> Self {
        Self {
            block_size,
            block_count: None,
        }
    }

    pub fn frame(block_size: u32, block_count: u32) -> Self {
        Self {
            block_size,
            block_count: Some(block_count),
        }
    }

    pub fn format(&self) -> Format {
        if self.block_count.is_some() {
            Format::Frame
        } else {
            Format::File
        }
    }

    /// Parse the header at the start of `buf`.
    ///
    /// Fails `TruncatedData` when `buf` is shorter than the header, and
    /// `MalformedHeader` on a wrong signature, a block size outside
    /// `BLOCKSIZE_MIN..=BLOCKSIZE_MAX`, or a block count above `i32::MAX`.
    pub fn parse(buf: &[u8], format: Format) -> Result<Self> {
        let need = format.header_len();
        if buf.len() < need {
            return Err(Error::TruncatedData(format!(
                "stream header needs {} bytes, only {} available",
                need,
                buf.len()
            )));
        }
        if &buf[..5] != SIGNATURE {
            return Err(Error::MalformedHeader(
                "signature mismatch, not a BZ3v1 stream".to_string(),
            ));
        }

        let block_size = load_u32_le(&buf[5..9]);
        if !(BLOCKSIZE_MIN..=BLOCKSIZE_MAX).contains(&block_size) {
            return Err(Error::MalformedHeader(format!(
                "block size {} outside {}..={}",
                block_size, BLOCKSIZE_MIN, BLOCKSIZE_MAX
            )));
        }

        let block_count = match format {
            Format::File => None,
            Format::Frame => {
                let count = load_u32_le(&buf[9..13]);
                if count > i32::MAX as u32 {
                    return Err(Error::MalformedHeader(format!(
                        "block count {} exceeds {}",
                        count,
                        i32::MAX
                    )));
                }
                Some(count)
            }
        };

        Ok(Self {
            block_size,
            block_count,
        })
    }

    /// Serialized length of this header.
    pub fn encoded_len(&self) -> usize {
        self.format().header_len()
    }

    /// Write the header into the front of `out`, which must hold at least
    /// [`encoded_len`](Self::encoded_len) bytes. No range validation is done on emit.
    pub fn emit_into(&self, out: &mut [u8]) {
        out[..5].copy_from_slice(SIGNATURE);
        out[5..9].copy_from_slice(&self.block_size.to_le_bytes());
        if let Some(count) = self.block_count {
            out[9..13].copy_from_slice(&count.to_le_bytes());
        }
    }

    /// Serialize to exactly 9 or 13 bytes.
    pub fn emit(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        self.emit_into(&mut buf);
        buf
    }
}

// ── Block sub-header ───────────────────────────────────────────────────────

/// The 8-byte record preceding every block payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockHeader {
    /// Bytes of compressed payload following this sub-header.
    pub packed_size: u32,
    /// Bytes the payload decompresses to.
    pub original_size: u32,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_LEN] {
        let mut buf = [0u8; BLOCK_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.packed_size.to_le_bytes());
        buf[4..8].copy_from_slice(&self.original_size.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; BLOCK_HEADER_LEN]) -> Self {
        Self {
            packed_size: load_u32_le(&buf[0..4]),
            original_size: load_u32_le(&buf[4..8]),
        }
    }

    /// True when the first bytes look like a stream signature instead of a
    /// block sub-header.
    pub fn is_signature(buf: &[u8]) -> bool {
        buf.len() >= SIGNATURE.len() && &buf[..SIGNATURE.len()] == SIGNATURE
    }
}
