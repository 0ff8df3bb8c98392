//! Walk the framing of an in-memory container without decompressing it.
//!
//! [`Records`] applies every structural check the batch decoder relies on,
//! so sizing an output buffer ([`scan_decoded_size`]) and describing a
//! container ([`inspect`]) see exactly the blocks a decode would.

use log::debug;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{clamp_block_size, BlockHeader, Format, StreamHeader, BLOCK_HEADER_LEN};
use crate::options::DecodeOptions;

/// A framed block located inside the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct BlockRecord<'a> {
    /// Offset of the block sub-header from the start of the input.
    pub offset: usize,
    pub header: BlockHeader,
    /// The `packed_size` payload bytes.
    pub payload: &'a [u8],
}

/// One item of a container, in stream order.
#[derive(Debug, Clone, Copy)]
pub enum Record<'a> {
    /// A stream header opening a segment, found at `offset`.
    Header { offset: usize, header: StreamHeader },
    Block(BlockRecord<'a>),
}

/// Iterator over the headers and blocks of a complete container.
///
/// Yields at most one error, after which it is exhausted.
pub struct Records<'a> {
    codec: &'a dyn Codec,
    input: &'a [u8],
    pos: usize,
    format: Format,
    concat: bool,
    max_block_size: u32,
    /// Block size declared by the current segment's header.
    block_size: u32,
    /// Blocks still owed by the current frame; `None` in file format.
    remaining: Option<u32>,
    started: bool,
    done: bool,
}

impl<'a> Records<'a> {
    pub fn new(codec: &'a dyn Codec, input: &'a [u8], options: DecodeOptions) -> Result<Self> {
        let max_block_size = clamp_block_size(options.max_block_size)?;
        Ok(Self {
            codec,
            input,
            pos: 0,
            format: options.format,
            concat: options.concat,
            max_block_size,
            block_size: 0,
            remaining: None,
            started: false,
            done: false,
        })
    }

    /// The clamped maximum block size headers are checked against.
    pub fn max_block_size(&self) -> u32 {
        self.max_block_size
    }

    /// Bytes of input consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn fail(&mut self, err: Error) -> Option<Result<Record<'a>>> {
        self.done = true;
        Some(Err(err))
    }

    fn adopt(&mut self, header: StreamHeader) -> Result<()> {
        if header.block_size > self.max_block_size {
            return Err(Error::OutOfBounds {
                block_size: header.block_size,
                max: self.max_block_size,
            });
        }
        debug!(
            "segment at offset {}: block size {}, block count {:?}",
            self.pos, header.block_size, header.block_count
        );
        self.block_size = header.block_size;
        self.remaining = header.block_count;
        Ok(())
    }

    fn header_record(&mut self, header: StreamHeader) -> Option<Result<Record<'a>>> {
        if let Err(err) = self.adopt(header) {
            return self.fail(err);
        }
        let offset = self.pos;
        self.pos += header.encoded_len();
        Some(Ok(Record::Header { offset, header }))
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let input = self.input;

        if !self.started {
            self.started = true;
            return match StreamHeader::parse(input, self.format) {
                Ok(header) => self.header_record(header),
                Err(err) => self.fail(err),
            };
        }

        let rest = &input[self.pos..];
        if rest.is_empty() {
            self.done = true;
            return match self.remaining {
                Some(n) if n > 0 => Some(Err(Error::TruncatedData(format!(
                    "input ends with {} block(s) of the frame still missing",
                    n
                )))),
                _ => None,
            };
        }

        // At a segment boundary another header may follow.
        if self.remaining.map_or(true, |n| n == 0) {
            match StreamHeader::parse(rest, self.format) {
                Ok(header) => {
                    if !self.concat {
                        debug!("stopping before concatenated segment at offset {}", self.pos);
                        self.done = true;
                        return None;
                    }
                    return self.header_record(header);
                }
                Err(err) => {
                    if self.remaining.is_some() {
                        // A completed frame may only be followed by another header.
                        let err = match err {
                            Error::TruncatedData(_) => err,
                            _ => Error::MalformedHeader(format!(
                                "unexpected data at offset {} after a completed frame",
                                self.pos
                            )),
                        };
                        return self.fail(err);
                    }
                    if BlockHeader::is_signature(rest) {
                        return self.fail(err);
                    }
                }
            }
        }

        if rest.len() < BLOCK_HEADER_LEN {
            return self.fail(Error::TruncatedData(format!(
                "block header at offset {} needs {} bytes, only {} remain",
                self.pos,
                BLOCK_HEADER_LEN,
                rest.len()
            )));
        }
        let mut raw = [0u8; BLOCK_HEADER_LEN];
        raw.copy_from_slice(&rest[..BLOCK_HEADER_LEN]);
        let header = BlockHeader::from_bytes(&raw);

        let packed = header.packed_size as usize;
        let original = header.original_size as usize;
        if header.original_size > self.block_size || packed > self.codec.bound(original) {
            return self.fail(Error::DataTooBig(format!(
                "block at offset {} declares {} packed / {} original bytes (block size {})",
                self.pos, packed, original, self.block_size
            )));
        }

        let end = BLOCK_HEADER_LEN + packed;
        if rest.len() < end {
            return self.fail(Error::TruncatedData(format!(
                "block at offset {} needs {} payload bytes, only {} remain",
                self.pos,
                packed,
                rest.len() - BLOCK_HEADER_LEN
            )));
        }

        let offset = self.pos;
        self.pos += end;
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        Some(Ok(Record::Block(BlockRecord {
            offset,
            header,
            payload: &rest[BLOCK_HEADER_LEN..end],
        })))
    }
}

/// Total decoded size of the blocks `decode` would produce from `input`.
pub fn scan_decoded_size(codec: &dyn Codec, input: &[u8], options: &DecodeOptions) -> Result<u64> {
    let mut total = 0u64;
    for record in Records::new(codec, input, *options)? {
        if let Record::Block(block) = record? {
            total += block.header.original_size as u64;
        }
    }
    Ok(total)
}

// ── Inspection ──────────────────────────────────────────────────────────────

/// Location and sizes of one block.
#[derive(Debug, Clone, Serialize)]
pub struct BlockInfo {
    pub offset: usize,
    pub packed_size: u32,
    pub original_size: u32,
}

/// One header and the blocks that follow it.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentInfo {
    pub offset: usize,
    pub header: StreamHeader,
    pub blocks: Vec<BlockInfo>,
}

impl SegmentInfo {
    /// Decoded bytes of all blocks in the segment.
    pub fn original_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.original_size as u64).sum()
    }

    /// Packed payload bytes, excluding headers.
    pub fn packed_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.packed_size as u64).sum()
    }
}

/// Describe every segment of `input` without decompressing any block.
pub fn inspect(codec: &dyn Codec, input: &[u8], options: &DecodeOptions) -> Result<Vec<SegmentInfo>> {
    let mut segments: Vec<SegmentInfo> = Vec::new();
    for record in Records::new(codec, input, *options)? {
        match record? {
            Record::Header { offset, header } => segments.push(SegmentInfo {
                offset,
                header,
                blocks: Vec::new(),
            }),
            Record::Block(block) => {
                // The first record is always a header.
                if let Some(segment) = segments.last_mut() {
                    segment.blocks.push(BlockInfo {
                        offset: block.offset,
                        packed_size: block.header.packed_size,
                        original_size: block.header.original_size,
                    });
                }
            }
        }
    }
    Ok(segments)
}
