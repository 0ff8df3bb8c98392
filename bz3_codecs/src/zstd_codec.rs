use bz3_core::{BlockState, Codec, Error, Result};
use zstd::bulk::{Compressor, Decompressor};

/// Zstandard block codec.
///
/// Each block is compressed independently at the configured level
/// (default: 3). A handle keeps one compression and one decompression
/// context alive, so they are reused across the blocks of a stream.
///
/// Best for: general text, JSON, logs, mixed structured data.
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn bound(&self, len: usize) -> usize {
        zstd::zstd_safe::compress_bound(len)
    }

    fn new_state(&self, _block_size: u32) -> Result<Box<dyn BlockState>> {
        let compressor = Compressor::new(self.level).map_err(|e| Error::codec("zstd", e))?;
        let decompressor = Decompressor::new().map_err(|e| Error::codec("zstd", e))?;
        Ok(Box::new(ZstdState {
            compressor,
            decompressor,
            scratch: Vec::new(),
        }))
    }
}

struct ZstdState {
    compressor: Compressor<'static>,
    decompressor: Decompressor<'static>,
    scratch: Vec<u8>,
}

impl BlockState for ZstdState {
    fn compress(&mut self, buf: &mut [u8], len: usize) -> Result<usize> {
        self.scratch.clear();
        self.scratch.reserve(buf.len());
        let n = self
            .compressor
            .compress_to_buffer(&buf[..len], &mut self.scratch)
            .map_err(|e| Error::codec("zstd", e))?;
        buf[..n].copy_from_slice(&self.scratch[..n]);
        Ok(n)
    }

    fn decompress(&mut self, buf: &mut [u8], packed_len: usize, original_len: usize) -> Result<usize> {
        self.scratch.clear();
        self.scratch.reserve(original_len);
        let n = self
            .decompressor
            .decompress_to_buffer(&buf[..packed_len], &mut self.scratch)
            .map_err(|e| Error::codec("zstd", e))?;
        if n > buf.len() {
            return Err(Error::codec(
                "zstd",
                format!("block decoded to {} bytes, buffer holds {}", n, buf.len()),
            ));
        }
        buf[..n].copy_from_slice(&self.scratch[..n]);
        Ok(n)
    }
}
