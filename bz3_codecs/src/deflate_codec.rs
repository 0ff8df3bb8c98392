use bz3_core::{BlockState, Codec, Error, Result};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

/// Raw DEFLATE block codec.
///
/// Each block is a complete raw-deflate stream; the handle's contexts are
/// reset between blocks instead of being reallocated.
///
/// Best for: interoperability with zlib-based tooling.
#[derive(Debug, Clone, Copy)]
pub struct DeflateCodec {
    /// Compression level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl Codec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    /// zlib's `compressBound`, plus slack for the pure-Rust backend.
    fn bound(&self, len: usize) -> usize {
        len + (len >> 12) + (len >> 14) + (len >> 25) + 13 + 64
    }

    fn new_state(&self, _block_size: u32) -> Result<Box<dyn BlockState>> {
        Ok(Box::new(DeflateState {
            compress: Compress::new(Compression::new(self.level), false),
            decompress: Decompress::new(false),
            scratch: Vec::new(),
        }))
    }
}

struct DeflateState {
    compress: Compress,
    decompress: Decompress,
    scratch: Vec<u8>,
}

impl BlockState for DeflateState {
    fn compress(&mut self, buf: &mut [u8], len: usize) -> Result<usize> {
        self.compress.reset();
        self.scratch.clear();
        self.scratch.resize(buf.len(), 0);
        let status = self
            .compress
            .compress(&buf[..len], &mut self.scratch, FlushCompress::Finish)
            .map_err(|e| Error::codec("deflate", e))?;
        if status != Status::StreamEnd {
            return Err(Error::codec("deflate", "output buffer too small for block"));
        }
        let n = self.compress.total_out() as usize;
        buf[..n].copy_from_slice(&self.scratch[..n]);
        Ok(n)
    }

    fn decompress(&mut self, buf: &mut [u8], packed_len: usize, original_len: usize) -> Result<usize> {
        self.decompress.reset(false);
        self.scratch.clear();
        // One spare byte so an overlong stream is reported as a size mismatch.
        self.scratch.resize(original_len + 1, 0);
        let status = self
            .decompress
            .decompress(&buf[..packed_len], &mut self.scratch, FlushDecompress::Finish)
            .map_err(|e| Error::codec("deflate", e))?;
        if status != Status::StreamEnd {
            return Err(Error::codec("deflate", "block ended before the end of its stream"));
        }
        let n = self.decompress.total_out() as usize;
        if n > buf.len() {
            return Err(Error::codec(
                "deflate",
                format!("block decoded to {} bytes, buffer holds {}", n, buf.len()),
            ));
        }
        buf[..n].copy_from_slice(&self.scratch[..n]);
        Ok(n)
    }
}
