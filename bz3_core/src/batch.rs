//! One-shot encode and decode of complete in-memory buffers.
//!
//! Both directions reuse the framing of [`crate::format`] and the block
//! processor, but keep no state between calls. On failure no partial output
//! is returned.

use std::sync::Arc;

use log::debug;

use crate::block::BlockProcessor;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{clamp_block_size, BlockHeader, Format, StreamHeader, BLOCK_HEADER_LEN};
use crate::options::{DecodeOptions, EncodeOptions};
use crate::scan::{scan_decoded_size, Record, Records};

/// Up-front reservation is limited to this multiple of the input length;
/// the output grows block by block past it.
const RESERVE_RATIO: usize = 8;

/// Decode a complete container, sizing the output from its own block headers.
///
/// The declared sizes come from the input, so only a bounded amount of
/// memory is reserved before any block has actually decoded.
pub fn decode(codec: Arc<dyn Codec>, input: &[u8], options: &DecodeOptions) -> Result<Vec<u8>> {
    let total = scan_decoded_size(codec.as_ref(), input, options)?;
    let capacity = usize::try_from(total)
        .map_err(|_| Error::DataTooBig(format!("decoded size {} does not fit in memory", total)))?;
    let reserve = capacity.min(input.len().saturating_mul(RESERVE_RATIO));
    decode_into(codec, input, capacity, options, Vec::with_capacity(reserve))
}

/// Decode a complete container into at most `capacity` bytes.
///
/// Fails `DataTooBig` as soon as a block would push the output past
/// `capacity`.
pub fn decode_with_capacity(
    codec: Arc<dyn Codec>,
    input: &[u8],
    capacity: usize,
    options: &DecodeOptions,
) -> Result<Vec<u8>> {
    decode_into(codec, input, capacity, options, Vec::new())
}

fn decode_into(
    codec: Arc<dyn Codec>,
    input: &[u8],
    capacity: usize,
    options: &DecodeOptions,
    mut out: Vec<u8>,
) -> Result<Vec<u8>> {
    let records = Records::new(codec.as_ref(), input, *options)?;
    let mut processor = BlockProcessor::new(codec.clone(), records.max_block_size())?;

    for record in records {
        let block = match record? {
            Record::Block(block) => block,
            Record::Header { .. } => continue,
        };

        let packed = block.payload.len();
        let original = block.header.original_size as usize;
        if capacity - out.len() < original {
            return Err(Error::DataTooBig(format!(
                "block at offset {} decodes to {} bytes, only {} of {} output bytes left",
                block.offset,
                original,
                capacity - out.len(),
                capacity
            )));
        }

        let start = out.len();
        out.resize(start + packed.max(original), 0);
        out[start..start + packed].copy_from_slice(block.payload);
        let decoded = processor.decode(&mut out[start..], packed, original)?;
        out.truncate(start + decoded);
    }

    debug!("decoded {} input bytes into {} bytes", input.len(), out.len());
    Ok(out)
}

/// Worst-case encoded size of `len` input bytes under `options`.
pub fn encoded_bound(codec: &dyn Codec, len: usize, options: &EncodeOptions) -> Result<usize> {
    let block_size = clamp_block_size(options.block_size)? as usize;
    let full = len / block_size;
    let tail = len % block_size;
    let mut bound = options.format.header_len() + full * (BLOCK_HEADER_LEN + codec.bound(block_size));
    if tail > 0 {
        bound += BLOCK_HEADER_LEN + codec.bound(tail);
    }
    Ok(bound)
}

/// Encode a complete buffer into a new container.
pub fn encode(codec: Arc<dyn Codec>, input: &[u8], options: &EncodeOptions) -> Result<Vec<u8>> {
    let capacity = encoded_bound(codec.as_ref(), input.len(), options)?;
    encode_with_capacity(codec, input, capacity, options)
}

/// Encode a complete buffer, producing at most `capacity` bytes.
///
/// Fails `InitError` if `capacity` cannot even hold the header and
/// `DataTooBig` if a block's worst case no longer fits.
pub fn encode_with_capacity(
    codec: Arc<dyn Codec>,
    input: &[u8],
    capacity: usize,
    options: &EncodeOptions,
) -> Result<Vec<u8>> {
    let block_size = clamp_block_size(options.block_size)?;
    let chunk_len = block_size as usize;

    let block_count = match options.format {
        Format::File => None,
        Format::Frame => {
            let count = input.len() / chunk_len + usize::from(input.len() % chunk_len != 0);
            if count > i32::MAX as usize {
                return Err(Error::DataTooBig(format!(
                    "{} blocks do not fit a frame block count",
                    count
                )));
            }
            Some(count as u32)
        }
    };

    let header = StreamHeader {
        block_size,
        block_count,
    };
    let header_len = header.encoded_len();
    if capacity < header_len {
        return Err(Error::InitError(format!(
            "output capacity {} is smaller than the {}-byte header",
            capacity, header_len
        )));
    }

    let mut processor = BlockProcessor::new(codec, block_size)?;
    let mut out = vec![0u8; header_len];

    for chunk in input.chunks(chunk_len) {
        let bound = processor.bound(chunk.len());
        if capacity - out.len() < BLOCK_HEADER_LEN + bound {
            return Err(Error::DataTooBig(format!(
                "{}-byte block may need {} bytes, only {} of {} output bytes left",
                chunk.len(),
                BLOCK_HEADER_LEN + bound,
                capacity - out.len(),
                capacity
            )));
        }

        let start = out.len();
        let payload = start + BLOCK_HEADER_LEN;
        out.resize(payload + bound.max(chunk.len()), 0);
        out[payload..payload + chunk.len()].copy_from_slice(chunk);
        let packed = processor.encode(&mut out[payload..], chunk.len())?;
        out.truncate(payload + packed);

        let block = BlockHeader {
            packed_size: packed as u32,
            original_size: chunk.len() as u32,
        };
        out[start..payload].copy_from_slice(&block.to_bytes());
    }

    header.emit_into(&mut out[..header_len]);
    debug!(
        "encoded {} bytes into {} bytes ({:?} format, block size {})",
        input.len(),
        out.len(),
        options.format,
        block_size
    );
    Ok(out)
}
