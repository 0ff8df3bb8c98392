use std::sync::Arc;

use log::trace;

use crate::codec::{BlockState, Codec};
use crate::error::{Error, Result};
use crate::format::clamp_block_size;

/// A compressor handle bound to a fixed block capacity.
///
/// Every encoder and decoder owns exactly one processor; it is never shared
/// between instances. Each call into the backend runs on the caller's thread
/// and holds nothing but `&mut self`.
pub struct BlockProcessor {
    codec: Arc<dyn Codec>,
    state: Box<dyn BlockState>,
    block_size: u32,
}

impl BlockProcessor {
    /// Create a handle for blocks of up to `block_size` bytes.
    ///
    /// Sizes below the minimum are raised; sizes above the maximum fail
    /// `InitError`.
    pub fn new(codec: Arc<dyn Codec>, block_size: u32) -> Result<Self> {
        let block_size = clamp_block_size(block_size)?;
        let state = codec.new_state(block_size)?;
        Ok(Self {
            codec,
            state,
            block_size,
        })
    }

    #[inline]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    #[inline]
    pub fn bound(&self, len: usize) -> usize {
        self.codec.bound(len)
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Compress `buf[..len]` in place and return the packed size.
    ///
    /// `buf` must be at least `bound(len)` bytes long.
    pub fn encode(&mut self, buf: &mut [u8], len: usize) -> Result<usize> {
        if len > self.block_size as usize {
            return Err(Error::SourceTooLarge {
                len,
                block_size: self.block_size,
            });
        }
        let need = self.bound(len);
        if buf.len() < need {
            return Err(Error::DataTooBig(format!(
                "encode buffer holds {} bytes, block needs up to {}",
                buf.len(),
                need
            )));
        }
        let packed = self.state.compress(buf, len)?;
        trace!("{}: encoded block {} -> {} bytes", self.codec.name(), len, packed);
        Ok(packed)
    }

    /// Decompress the `packed`-byte block at the front of `buf` in place and
    /// return the decoded size, which always equals `original`.
    pub fn decode(&mut self, buf: &mut [u8], packed: usize, original: usize) -> Result<usize> {
        if original > self.block_size as usize {
            return Err(Error::OutOfBounds {
                block_size: u32::try_from(original).unwrap_or(u32::MAX),
                max: self.block_size,
            });
        }
        if buf.len() < packed.max(original) {
            return Err(Error::DataTooBig(format!(
                "decode buffer holds {} bytes, block needs {}",
                buf.len(),
                packed.max(original)
            )));
        }
        let decoded = self.state.decompress(buf, packed, original)?;
        if decoded != original {
            return Err(Error::Codec {
                codec: self.codec.name(),
                message: format!(
                    "block decoded to {} bytes but its header says {}",
                    decoded, original
                ),
            });
        }
        trace!("{}: decoded block {} -> {} bytes", self.codec.name(), packed, decoded);
        Ok(decoded)
    }

    /// Compress `src` into a freshly sized buffer.
    pub fn encode_to_vec(&mut self, src: &[u8]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.bound(src.len()).max(src.len())];
        buf[..src.len()].copy_from_slice(src);
        let packed = self.encode(&mut buf, src.len())?;
        buf.truncate(packed);
        Ok(buf)
    }

    /// Decompress `packed` into a freshly sized buffer of `original` bytes.
    pub fn decode_to_vec(&mut self, packed: &[u8], original: usize) -> Result<Vec<u8>> {
        if original > self.block_size as usize {
            return Err(Error::OutOfBounds {
                block_size: u32::try_from(original).unwrap_or(u32::MAX),
                max: self.block_size,
            });
        }
        let mut buf = vec![0u8; packed.len().max(original)];
        buf[..packed.len()].copy_from_slice(packed);
        let decoded = self.decode(&mut buf, packed.len(), original)?;
        buf.truncate(decoded);
        Ok(buf)
    }
}

impl std::fmt::Debug for BlockProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockProcessor")
            .field("codec", &self.codec.name())
            .field("block_size", &self.block_size)
            .finish()
    }
}
