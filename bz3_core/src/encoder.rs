use std::io::{self, Write};
use std::sync::Arc;

use log::{debug, trace};

use crate::block::BlockProcessor;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{clamp_block_size, BlockHeader, Format, StreamHeader, BLOCK_HEADER_LEN};
use crate::options::EncodeOptions;

/// Incremental encoder over a push-based byte sink, producing a file-format
/// container.
///
/// # Write contract
/// Call [`write`](Self::write) any number of times with arbitrary-sized
/// slices. Data is gathered until `block_size` bytes are available, then
/// emitted as one block; full blocks inside a large slice are compressed
/// straight from it. [`flush`](Self::flush) emits whatever is pending as a
/// short block, and [`close`](Self::close) flushes once more.
///
/// The stream header goes out together with the first block. A stream that
/// never emitted a block still gets a bare header on close.
///
/// Any error leaves the encoder unusable; later calls fail
/// [`Error::Poisoned`]. Dropping an encoder that is neither closed nor
/// failed closes it, ignoring any error; call [`finish`](Self::finish) to
/// observe one.
pub struct Encoder<W: Write> {
    /// Taken only by `finish`.
    sink: Option<W>,
    processor: BlockProcessor,
    block_size: usize,
    /// Raw bytes not yet emitted; always shorter than `block_size`.
    pending: Vec<u8>,
    /// Holds the framed output of one block before it goes to the sink.
    scratch: Vec<u8>,
    header_written: bool,
    blocks: u64,
    closed: bool,
    failed: bool,
}

impl<W: Write> Encoder<W> {
    /// Create an encoder writing to `sink`.
    ///
    /// Fails `InitError` for `Format::Frame`, whose block count cannot be
    /// known up front, and for a block size above the maximum.
    pub fn new(codec: Arc<dyn Codec>, sink: W, options: EncodeOptions) -> Result<Self> {
        if options.format != Format::File {
            return Err(Error::InitError(
                "the streaming encoder only writes the file format".to_string(),
            ));
        }
        let block_size = clamp_block_size(options.block_size)?;
        let processor = BlockProcessor::new(codec, block_size)?;
        debug!(
            "encoder: codec {}, block size {}",
            processor.codec().name(),
            block_size
        );
        Ok(Self {
            sink: Some(sink),
            processor,
            block_size: block_size as usize,
            pending: Vec::new(),
            scratch: Vec::new(),
            header_written: false,
            blocks: 0,
            closed: false,
            failed: false,
        })
    }

    /// Buffer `data`, emitting every block it completes.
    pub fn write(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.check_usable()?;
        self.guard(|e| e.write_bytes(data))?;
        Ok(self)
    }

    /// Alias of [`write`](Self::write), for chaining.
    pub fn append(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.write(data)
    }

    /// Emit pending bytes as a short block and flush the sink.
    ///
    /// Does nothing to the output when nothing is pending.
    pub fn flush(&mut self) -> Result<()> {
        self.check_usable()?;
        self.guard(|e| e.flush_pending())
    }

    /// Flush, and make sure the stream has at least its header.
    ///
    /// Closing twice fails `Closed`.
    pub fn close(&mut self) -> Result<()> {
        self.check_usable()?;
        self.guard(|e| {
            e.flush_pending()?;
            if !e.header_written {
                let header = StreamHeader::file(e.block_size as u32).emit();
                let sink = e.sink_mut()?;
                sink.write_all(&header)?;
                sink.flush()?;
                e.header_written = true;
            }
            Ok(())
        })?;
        self.closed = true;
        debug!("encoder closed after {} block(s)", self.blocks);
        Ok(())
    }

    /// Close the encoder and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.sink.take().ok_or(Error::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &W {
        match &self.sink {
            Some(sink) => sink,
            None => unreachable!("sink is only taken by finish, which consumes the encoder"),
        }
    }

    /// Number of blocks emitted so far.
    pub fn blocks_written(&self) -> u64 {
        self.blocks
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        self.sink.as_mut().ok_or(Error::Closed)
    }

    fn check_usable(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.failed {
            return Err(Error::Poisoned);
        }
        Ok(())
    }

    fn guard<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = f(self);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn write_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        if !self.pending.is_empty() {
            let take = (self.block_size - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() < self.block_size {
                return Ok(());
            }
            self.flush_pending_block()?;
        }

        while data.len() >= self.block_size {
            let (block, rest) = data.split_at(self.block_size);
            self.emit_block(block)?;
            data = rest;
        }

        self.pending.extend_from_slice(data);
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.flush_pending_block()?;
        }
        self.sink_mut()?.flush()?;
        Ok(())
    }

    fn flush_pending_block(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let result = self.emit_block(&pending);
        self.pending = pending;
        self.pending.clear();
        result
    }

    /// Frame and compress `block`, then write it to the sink, preceded by
    /// the stream header if this is the first block.
    fn emit_block(&mut self, block: &[u8]) -> Result<()> {
        let header_len = if self.header_written {
            0
        } else {
            Format::File.header_len()
        };
        let payload = header_len + BLOCK_HEADER_LEN;
        let bound = self.processor.bound(block.len()).max(block.len());

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.resize(payload + bound, 0);
        scratch[payload..payload + block.len()].copy_from_slice(block);

        let result = self
            .processor
            .encode(&mut scratch[payload..], block.len())
            .and_then(|packed| {
                if header_len > 0 {
                    StreamHeader::file(self.block_size as u32).emit_into(&mut scratch[..header_len]);
                }
                let sub = BlockHeader {
                    packed_size: packed as u32,
                    original_size: block.len() as u32,
                };
                scratch[header_len..payload].copy_from_slice(&sub.to_bytes());
                self.sink
                    .as_mut()
                    .ok_or(Error::Closed)?
                    .write_all(&scratch[..payload + packed])?;
                trace!("emitted block {}: {} -> {} bytes", self.blocks, block.len(), packed);
                Ok(())
            });
        self.scratch = scratch;
        result?;

        self.header_written = true;
        self.blocks += 1;
        Ok(())
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Encoder::write(self, buf).map_err(io::Error::from)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Encoder::flush(self).map_err(io::Error::from)
    }
}

impl<W: Write> Drop for Encoder<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && !self.closed && !self.failed {
            let _ = self.close();
        }
    }
}

impl<W: Write> std::fmt::Debug for Encoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("processor", &self.processor)
            .field("pending", &self.pending.len())
            .field("blocks", &self.blocks)
            .field("closed", &self.closed)
            .finish()
    }
}
