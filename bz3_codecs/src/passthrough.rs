use bz3_core::{BlockState, Codec, Result};

/// No-op codec: stores blocks verbatim, with no compression.
///
/// Useful for:
/// - Checking the container framing independently of any compressor.
/// - Data that is already compressed, where a real codec would only expand it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn bound(&self, len: usize) -> usize {
        len
    }

    fn new_state(&self, _block_size: u32) -> Result<Box<dyn BlockState>> {
        Ok(Box::new(PassThroughState))
    }
}

struct PassThroughState;

impl BlockState for PassThroughState {
    fn compress(&mut self, _buf: &mut [u8], len: usize) -> Result<usize> {
        Ok(len)
    }

    fn decompress(&mut self, _buf: &mut [u8], packed_len: usize, _original_len: usize) -> Result<usize> {
        Ok(packed_len)
    }
}
