//! BZ3v1 container format.
//!
//! A container is a 9-byte (file) or 13-byte (frame) stream header followed
//! by independently compressed blocks, each preceded by an 8-byte sub-header
//! carrying its packed and original sizes. Containers may be appended to one
//! another; decoders follow them unless concatenation is disabled.
//!
//! Compression itself is delegated to a [`Codec`]; backends live in the
//! `bz3_codecs` crate.

pub mod batch;
pub mod block;
pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod format;
pub mod options;
pub mod scan;

pub use batch::{decode, decode_with_capacity, encode, encode_with_capacity, encoded_bound};
pub use block::BlockProcessor;
pub use codec::{BlockState, Codec};
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{Error, ErrorKind, Result};
pub use format::{
    clamp_block_size, BlockHeader, Format, StreamHeader, BLOCKSIZE_MAX, BLOCKSIZE_MIN,
    BLOCK_HEADER_LEN, DEFAULT_BLOCK_SIZE, FILE_HEADER_LEN, FRAME_HEADER_LEN, SIGNATURE,
};
pub use options::{DecodeOptions, EncodeOptions};
pub use scan::{inspect, scan_decoded_size, BlockInfo, SegmentInfo};
