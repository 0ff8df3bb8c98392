use std::io::{self, Read};
use std::sync::Arc;

use log::{debug, trace};

use crate::block::BlockProcessor;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{
    clamp_block_size, BlockHeader, Format, StreamHeader, BLOCK_HEADER_LEN, FRAME_HEADER_LEN,
};
use crate::options::DecodeOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// The stream header has not been consumed yet.
    BeforeHeader,
    /// Blocks are being pulled from the source.
    Reading,
    /// No further blocks will be pulled; buffered bytes may still be read.
    EndOfStream,
    /// An earlier call failed.
    Failed,
}

/// Incremental decoder over a pull-based byte source.
///
/// # Read contract
/// [`read`](Self::read) returns exactly `max_len` bytes while the stream
/// lasts, fewer only at the end, and `None` once everything has been
/// returned. Decoded bytes that do not fit the request are kept and handed
/// out first on the next call.
///
/// # Source contract
/// Short reads from the source are retried; only a zero-length read means
/// end-of-input. A source that reports more bytes than requested fails the
/// decoder with [`Error::SourceOverrun`].
///
/// Any error leaves the decoder unusable; later calls fail
/// [`Error::Poisoned`].
pub struct Decoder<R> {
    source: R,
    processor: BlockProcessor,
    format: Format,
    concat: bool,
    phase: Phase,
    closed: bool,
    /// Block size declared by the current segment.
    block_size: u32,
    /// Blocks still owed by the current frame; `None` in file format.
    remaining: Option<u32>,
    /// Scratch for one packed payload, decoded in place.
    scratch: Vec<u8>,
    /// Decoded bytes not yet returned; `pending[cursor..]` is live.
    pending: Vec<u8>,
    cursor: usize,
}

impl<R: Read> Decoder<R> {
    /// Create a decoder pulling from `source`.
    ///
    /// The compressor handle is sized to `options.max_block_size`; streams
    /// declaring a larger block size fail `OutOfBounds`.
    pub fn new(codec: Arc<dyn Codec>, source: R, options: DecodeOptions) -> Result<Self> {
        let max_block_size = clamp_block_size(options.max_block_size)?;
        let processor = BlockProcessor::new(codec, max_block_size)?;
        Ok(Self {
            source,
            processor,
            format: options.format,
            concat: options.concat,
            phase: Phase::BeforeHeader,
            closed: false,
            block_size: 0,
            remaining: None,
            scratch: Vec::new(),
            pending: Vec::new(),
            cursor: 0,
        })
    }

    /// Read up to `max_len` decoded bytes.
    ///
    /// Returns `Some` with an empty buffer when `max_len` is zero, and `None`
    /// when the stream is exhausted.
    pub fn read(&mut self, max_len: usize) -> Result<Option<Vec<u8>>> {
        self.check_usable()?;
        if max_len == 0 {
            return Ok(Some(Vec::new()));
        }

        let mut out = Vec::new();
        loop {
            let want = max_len - out.len();
            let n = self.drain_pending(want, &mut out);
            if n == want {
                break;
            }
            if !self.guard(|d| d.fill_block())? {
                break;
            }
        }

        Ok(if out.is_empty() { None } else { Some(out) })
    }

    /// Read everything that remains.
    pub fn read_all(&mut self) -> Result<Option<Vec<u8>>> {
        self.read(usize::MAX)
    }

    /// Mark the decoder closed. Closing twice fails `Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        debug!("decoder closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True once the source is exhausted or a non-concatenated segment ended.
    pub fn is_end_of_stream(&self) -> bool {
        self.phase == Phase::EndOfStream
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn check_usable(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.phase == Phase::Failed {
            return Err(Error::Poisoned);
        }
        Ok(())
    }

    fn guard<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = f(self);
        if result.is_err() {
            self.phase = Phase::Failed;
        }
        result
    }

    /// Move up to `want` pending bytes into `out`; returns how many moved.
    fn drain_pending(&mut self, want: usize, out: &mut Vec<u8>) -> usize {
        let available = self.pending.len() - self.cursor;
        let n = available.min(want);
        out.extend_from_slice(&self.pending[self.cursor..self.cursor + n]);
        self.cursor += n;
        if self.cursor == self.pending.len() {
            self.pending.clear();
            self.cursor = 0;
        }
        n
    }

    /// Same as `drain_pending`, into a caller slice.
    fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let available = self.pending.len() - self.cursor;
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.cursor..self.cursor + n]);
        self.cursor += n;
        if self.cursor == self.pending.len() {
            self.pending.clear();
            self.cursor = 0;
        }
        n
    }

    /// Fill `buf` from the source, retrying short reads. Returns the number
    /// of bytes read, less than `buf.len()` only at end-of-input.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let requested = buf.len() - filled;
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) if n > requested => {
                    return Err(Error::SourceOverrun {
                        requested,
                        returned: n,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn adopt(&mut self, header: StreamHeader) -> Result<()> {
        let max = self.processor.block_size();
        if header.block_size > max {
            return Err(Error::OutOfBounds {
                block_size: header.block_size,
                max,
            });
        }
        debug!(
            "stream segment: block size {}, block count {:?}",
            header.block_size, header.block_count
        );
        self.block_size = header.block_size;
        self.remaining = header.block_count;
        Ok(())
    }

    fn read_stream_header(&mut self) -> Result<()> {
        let len = self.format.header_len();
        let mut buf = [0u8; FRAME_HEADER_LEN];
        let n = self.read_full(&mut buf[..len])?;
        if n < len {
            return Err(Error::MalformedHeader(format!(
                "stream header needs {} bytes, source ended after {}",
                len, n
            )));
        }
        let header = StreamHeader::parse(&buf[..len], self.format)?;
        self.adopt(header)?;
        self.phase = Phase::Reading;
        Ok(())
    }

    /// Pull and decode one block into `pending`.
    ///
    /// Returns `false` when the stream has ended instead.
    fn fill_block(&mut self) -> Result<bool> {
        match self.phase {
            Phase::EndOfStream => return Ok(false),
            Phase::Failed => return Err(Error::Poisoned),
            Phase::BeforeHeader => self.read_stream_header()?,
            Phase::Reading => {}
        }

        loop {
            let mut marker = [0u8; FRAME_HEADER_LEN];
            let n = self.read_full(&mut marker[..BLOCK_HEADER_LEN])?;
            if n == 0 {
                if let Some(missing) = self.remaining.filter(|&m| m > 0) {
                    return Err(Error::TruncatedData(format!(
                        "source ended with {} block(s) of the frame still missing",
                        missing
                    )));
                }
                debug!("end of stream");
                self.phase = Phase::EndOfStream;
                return Ok(false);
            }
            if n < BLOCK_HEADER_LEN {
                return Err(Error::TruncatedData(format!(
                    "block header needs {} bytes, source ended after {}",
                    BLOCK_HEADER_LEN, n
                )));
            }

            let at_boundary = self.remaining.map_or(true, |m| m == 0);
            if at_boundary && BlockHeader::is_signature(&marker) {
                let len = self.format.header_len();
                let rest = self.read_full(&mut marker[BLOCK_HEADER_LEN..len])?;
                if BLOCK_HEADER_LEN + rest < len {
                    return Err(Error::MalformedHeader(
                        "source ended inside a concatenated stream header".to_string(),
                    ));
                }
                let header = StreamHeader::parse(&marker[..len], self.format)?;
                if !self.concat {
                    debug!("next segment found, concatenation disabled");
                    self.phase = Phase::EndOfStream;
                    return Ok(false);
                }
                self.adopt(header)?;
                continue;
            }
            if at_boundary && self.remaining.is_some() {
                return Err(Error::MalformedHeader(
                    "expected a stream header after a completed frame".to_string(),
                ));
            }

            let mut raw = [0u8; BLOCK_HEADER_LEN];
            raw.copy_from_slice(&marker[..BLOCK_HEADER_LEN]);
            let header = BlockHeader::from_bytes(&raw);
            self.read_block(header)?;
            if let Some(m) = self.remaining.as_mut() {
                *m -= 1;
            }
            return Ok(true);
        }
    }

    fn read_block(&mut self, header: BlockHeader) -> Result<()> {
        let packed = header.packed_size as usize;
        let original = header.original_size as usize;
        if header.original_size > self.block_size || packed > self.processor.bound(original) {
            return Err(Error::DataTooBig(format!(
                "block declares {} packed / {} original bytes (block size {})",
                packed, original, self.block_size
            )));
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.resize(packed.max(original), 0);
        let received = self.read_full(&mut scratch[..packed]);
        let received = match received {
            Ok(n) => n,
            Err(e) => {
                self.scratch = scratch;
                return Err(e);
            }
        };
        if received < packed {
            self.scratch = scratch;
            return Err(Error::UnexpectedEof {
                expected: packed,
                received,
            });
        }

        let decoded = self.processor.decode(&mut scratch, packed, original);
        if let Ok(n) = decoded {
            trace!("decoded streamed block {} -> {} bytes", packed, n);
            self.pending.extend_from_slice(&scratch[..n]);
        }
        self.scratch = scratch;
        decoded.map(|_| ())
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_usable()?;
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.drain_into(buf);
            if n > 0 {
                return Ok(n);
            }
            if !self.guard(|d| d.fill_block())? {
                return Ok(0);
            }
        }
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(io::Error::from)
    }
}

impl<R> std::fmt::Debug for Decoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("processor", &self.processor)
            .field("format", &self.format)
            .field("concat", &self.concat)
            .field("phase", &self.phase)
            .field("closed", &self.closed)
            .field("buffered", &(self.pending.len() - self.cursor))
            .finish()
    }
}
