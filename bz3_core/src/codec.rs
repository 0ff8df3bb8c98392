use crate::error::Result;

/// Block compressor abstraction.
///
/// A `Codec` is the factory side of the external block primitive: it reports
/// the worst-case packed size of a block and creates per-stream
/// [`BlockState`] handles. The container format never inspects what a codec
/// does to the bytes; it only frames the results.
///
/// The stream header carries no codec tag, so the same codec must be used to
/// decode a stream as was used to encode it.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for logs and CLI display.
    fn name(&self) -> &'static str;

    /// Worst-case packed size for a block of `len` original bytes.
    fn bound(&self, len: usize) -> usize;

    /// Allocate a handle able to process blocks of up to `block_size` bytes.
    ///
    /// The handle is released by dropping it.
    fn new_state(&self, block_size: u32) -> Result<Box<dyn BlockState>>;
}

/// One exclusively owned compressor handle.
///
/// Both operations work in place on the caller's buffer so that scratch
/// space can be reused across blocks.
pub trait BlockState: Send {
    /// Compress the first `len` bytes of `buf` in place.
    ///
    /// `buf.len()` is at least `Codec::bound(len)`. Returns the packed size;
    /// the packed bytes occupy `buf[..packed]` afterwards.
    fn compress(&mut self, buf: &mut [u8], len: usize) -> Result<usize>;

    /// Decompress the `packed_len`-byte block at the front of `buf` in place.
    ///
    /// `buf.len()` is at least `max(packed_len, original_len)`. Returns the
    /// decoded size; the original bytes occupy `buf[..decoded]` afterwards.
    fn decompress(&mut self, buf: &mut [u8], packed_len: usize, original_len: usize)
        -> Result<usize>;
}
