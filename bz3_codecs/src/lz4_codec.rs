use bz3_core::{BlockState, Codec, Error, Result};
use lz4_flex::block::{compress_into, decompress_into, get_maximum_output_size};

/// LZ4 block codec.
///
/// Fastest decompression of all bundled codecs. Uses the raw block API, so
/// the packed payload carries no size prefix; the container's sub-header
/// already records the original size.
///
/// Best for: hot data, low-latency pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn bound(&self, len: usize) -> usize {
        get_maximum_output_size(len)
    }

    fn new_state(&self, _block_size: u32) -> Result<Box<dyn BlockState>> {
        Ok(Box::new(Lz4State { scratch: Vec::new() }))
    }
}

struct Lz4State {
    scratch: Vec<u8>,
}

impl BlockState for Lz4State {
    fn compress(&mut self, buf: &mut [u8], len: usize) -> Result<usize> {
        self.scratch.clear();
        self.scratch.resize(get_maximum_output_size(len), 0);
        let n = compress_into(&buf[..len], &mut self.scratch).map_err(|e| Error::codec("lz4", e))?;
        buf[..n].copy_from_slice(&self.scratch[..n]);
        Ok(n)
    }

    fn decompress(&mut self, buf: &mut [u8], packed_len: usize, original_len: usize) -> Result<usize> {
        self.scratch.clear();
        self.scratch.resize(original_len, 0);
        let n = decompress_into(&buf[..packed_len], &mut self.scratch)
            .map_err(|e| Error::codec("lz4", e))?;
        buf[..n].copy_from_slice(&self.scratch[..n]);
        Ok(n)
    }
}
