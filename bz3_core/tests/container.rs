/// Batch encode/decode over complete buffers: framing, concatenation,
/// truncation detection, and capacity limits.
mod common;

use std::sync::Arc;

use bz3_codecs::{DeflateCodec, Lz4Codec};
use bz3_core::{
    decode, decode_with_capacity, encode, encode_with_capacity, encoded_bound, inspect,
    scan_decoded_size, BlockHeader, Codec, DecodeOptions, EncodeOptions, ErrorKind, Format,
    StreamHeader, BLOCKSIZE_MAX, BLOCKSIZE_MIN, BLOCK_HEADER_LEN, DEFAULT_BLOCK_SIZE,
    FILE_HEADER_LEN, FRAME_HEADER_LEN,
};
use proptest::prelude::*;

use common::{compressible_bytes, passthrough, pseudo_random_bytes, zstd};

const BLOCK: u32 = BLOCKSIZE_MIN;

fn file_opts() -> EncodeOptions {
    EncodeOptions::default().with_block_size(BLOCK)
}

fn frame_opts() -> EncodeOptions {
    EncodeOptions::default()
        .with_block_size(BLOCK)
        .with_format(Format::Frame)
}

fn frame_decode() -> DecodeOptions {
    DecodeOptions::default().with_format(Format::Frame)
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_hello_world() {
    let opts = EncodeOptions::default().with_block_size(65536);
    let encoded = encode(zstd(), b"hello world", &opts).unwrap();

    assert_eq!(&encoded[..5], b"BZ3v1");
    // 64 KiB is below the minimum and is raised to 65 KiB.
    assert_eq!(&encoded[5..9], &BLOCKSIZE_MIN.to_le_bytes());

    let decoded = decode(zstd(), &encoded, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded, b"hello world");
}

#[test]
fn test_roundtrip_file_and_frame() {
    let data = compressible_bytes(3 * BLOCK as usize + 4321);

    let encoded = encode(zstd(), &data, &file_opts()).unwrap();
    assert!(encoded.len() < data.len() / 4, "compressible input should shrink");
    assert_eq!(decode(zstd(), &encoded, &DecodeOptions::default()).unwrap(), data);

    let encoded = encode(zstd(), &data, &frame_opts()).unwrap();
    let header = StreamHeader::parse(&encoded, Format::Frame).unwrap();
    assert_eq!(header.block_count, Some(4));
    assert_eq!(decode(zstd(), &encoded, &frame_decode()).unwrap(), data);
}

#[test]
fn test_roundtrip_lz4_and_deflate() {
    let data = compressible_bytes(2 * BLOCK as usize + 999);
    let noise = pseudo_random_bytes(BLOCK as usize + 13, 21);

    let codecs: [Arc<dyn Codec>; 2] = [Arc::new(Lz4Codec), Arc::new(DeflateCodec::default())];
    for codec in codecs {
        for input in [&data, &noise] {
            let encoded = encode(codec.clone(), input, &frame_opts()).unwrap();
            let decoded = decode(codec.clone(), &encoded, &frame_decode()).unwrap();
            assert_eq!(&decoded, input, "{} round-trip mismatch", codec.name());
        }
    }
}

#[test]
fn test_empty_payloads_claiming_huge_output_fail_cleanly() {
    let mut input = StreamHeader::file(DEFAULT_BLOCK_SIZE).emit();
    let empty = BlockHeader {
        packed_size: 0,
        original_size: DEFAULT_BLOCK_SIZE,
    };
    for _ in 0..200_000 {
        input.extend_from_slice(&empty.to_bytes());
    }

    // Declared output is about 3 TB; decoding must fail, not abort.
    let total = scan_decoded_size(passthrough().as_ref(), &input, &DecodeOptions::default());
    assert_eq!(total.unwrap(), 200_000 * DEFAULT_BLOCK_SIZE as u64);
    let err = decode(passthrough(), &input, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Codec);
}

#[test]
fn test_incompressible_data_roundtrips() {
    let data = pseudo_random_bytes(2 * BLOCK as usize, 99);
    let encoded = encode(zstd(), &data, &file_opts()).unwrap();
    assert!(encoded.len() <= encoded_bound(zstd().as_ref(), data.len(), &file_opts()).unwrap());
    assert_eq!(decode(zstd(), &encoded, &DecodeOptions::default()).unwrap(), data);
}

#[test]
fn test_empty_input_is_header_only() {
    let encoded = encode(zstd(), &[], &file_opts()).unwrap();
    assert_eq!(encoded.len(), FILE_HEADER_LEN);
    assert!(decode(zstd(), &encoded, &DecodeOptions::default()).unwrap().is_empty());

    let encoded = encode(zstd(), &[], &frame_opts()).unwrap();
    assert_eq!(encoded.len(), FRAME_HEADER_LEN);
    assert_eq!(&encoded[9..13], &0u32.to_le_bytes());
    assert!(decode(zstd(), &encoded, &frame_decode()).unwrap().is_empty());
}

#[test]
fn test_exact_block_size_is_one_block() {
    let data = compressible_bytes(BLOCK as usize);
    let encoded = encode(passthrough(), &data, &file_opts()).unwrap();
    assert_eq!(encoded.len(), FILE_HEADER_LEN + BLOCK_HEADER_LEN + data.len());

    let segments = inspect(passthrough().as_ref(), &encoded, &DecodeOptions::default()).unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].blocks.len(), 1);
    assert_eq!(segments[0].blocks[0].original_size, BLOCK);

    // One byte more spills into a second, one-byte block.
    let data = compressible_bytes(BLOCK as usize + 1);
    let encoded = encode(passthrough(), &data, &file_opts()).unwrap();
    let segments = inspect(passthrough().as_ref(), &encoded, &DecodeOptions::default()).unwrap();
    assert_eq!(segments[0].blocks.len(), 2);
    assert_eq!(segments[0].blocks[1].original_size, 1);
}

#[test]
fn test_concatenation() {
    let first = compressible_bytes(BLOCK as usize + 10);
    let second = pseudo_random_bytes(5000, 3);

    let mut joined = encode(zstd(), &first, &file_opts()).unwrap();
    let second_opts = EncodeOptions::default().with_block_size(2 * BLOCK);
    joined.extend(encode(zstd(), &second, &second_opts).unwrap());

    let all = decode(zstd(), &joined, &DecodeOptions::default()).unwrap();
    assert_eq!(all.len(), first.len() + second.len());
    assert_eq!(&all[..first.len()], &first[..]);
    assert_eq!(&all[first.len()..], &second[..]);

    let only_first = decode(zstd(), &joined, &DecodeOptions::default().with_concat(false)).unwrap();
    assert_eq!(only_first, first);

    let segments = inspect(zstd().as_ref(), &joined, &DecodeOptions::default()).unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].header.block_size, 2 * BLOCK);
}

#[test]
fn test_frame_concatenation() {
    let first = compressible_bytes(2 * BLOCK as usize);
    let second = compressible_bytes(100);

    let mut joined = encode(zstd(), &first, &frame_opts()).unwrap();
    joined.extend(encode(zstd(), &second, &frame_opts()).unwrap());

    let all = decode(zstd(), &joined, &frame_decode()).unwrap();
    assert_eq!(all.len(), first.len() + second.len());
    assert_eq!(decode(zstd(), &joined, &frame_decode().with_concat(false)).unwrap(), first);
}

#[test]
fn test_frame_truncation_detected_at_every_offset() {
    let data = compressible_bytes(5 * BLOCK as usize / 2);
    let encoded = encode(zstd(), &data, &frame_opts()).unwrap();

    for cut in 0..encoded.len() {
        let err = decode(zstd(), &encoded[..cut], &frame_decode()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData, "cut at {}: {}", cut, err);
    }
}

#[test]
fn test_file_truncation_inside_blocks() {
    let data = compressible_bytes(5 * BLOCK as usize / 2);
    let encoded = encode(zstd(), &data, &file_opts()).unwrap();
    let segments = inspect(zstd().as_ref(), &encoded, &DecodeOptions::default()).unwrap();

    let mut cuts: Vec<usize> = (0..FILE_HEADER_LEN).collect();
    for block in &segments[0].blocks {
        let end = block.offset + BLOCK_HEADER_LEN + block.packed_size as usize;
        cuts.extend(block.offset + 1..end);
    }

    for cut in cuts {
        let err = decode(zstd(), &encoded[..cut], &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData, "cut at {}: {}", cut, err);
    }
}

#[test]
fn test_header_rejection() {
    let mut bad = encode(zstd(), b"payload", &file_opts()).unwrap();
    bad[0] = b'X';
    let err = decode(zstd(), &bad, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);

    for block_size in [0u32, BLOCKSIZE_MAX + 1] {
        let mut header = b"BZ3v1".to_vec();
        header.extend_from_slice(&block_size.to_le_bytes());
        let err = decode(zstd(), &header, &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHeader, "block size {}", block_size);
    }

    // A file header is too short to be a frame header.
    let file = encode(zstd(), &[], &file_opts()).unwrap();
    let err = decode(zstd(), &file, &frame_decode()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TruncatedData);
}

#[test]
fn test_header_block_size_above_configured_max() {
    let opts = EncodeOptions::default().with_block_size(1 << 20);
    let encoded = encode(zstd(), &compressible_bytes(1000), &opts).unwrap();

    let strict = DecodeOptions::default().with_max_block_size(BLOCK);
    let err = decode(zstd(), &encoded, &strict).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfBounds);
    assert!(!err.is_corruption());

    let relaxed = DecodeOptions::default().with_max_block_size(1 << 20);
    assert_eq!(decode(zstd(), &encoded, &relaxed).unwrap().len(), 1000);
}

#[test]
fn test_oversized_block_records_rejected() {
    let data = compressible_bytes(100);
    let encoded = encode(passthrough(), &data, &file_opts()).unwrap();
    let sub = FILE_HEADER_LEN;

    // original_size larger than the declared block size
    let mut bad = encoded.clone();
    bad[sub + 4..sub + 8].copy_from_slice(&(BLOCK + 1).to_le_bytes());
    let err = decode(passthrough(), &bad, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataTooBig);

    // packed_size larger than the codec's bound for original_size
    let mut bad = encoded;
    bad[sub..sub + 4].copy_from_slice(&101u32.to_le_bytes());
    let err = decode(passthrough(), &bad, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataTooBig);
}

#[test]
fn test_frame_trailing_garbage_rejected() {
    let mut encoded = encode(zstd(), b"framed", &frame_opts()).unwrap();
    encoded.extend_from_slice(b"definitely not a header");
    let err = decode(zstd(), &encoded, &frame_decode()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);
}

#[test]
fn test_codec_errors_pass_through() {
    let data = compressible_bytes(10_000);
    let mut encoded = encode(zstd(), &data, &file_opts()).unwrap();
    // Destroy the zstd frame magic at the start of the payload.
    let payload = FILE_HEADER_LEN + BLOCK_HEADER_LEN;
    encoded[payload..payload + 4].copy_from_slice(&[0, 0, 0, 0]);
    let err = decode(zstd(), &encoded, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Codec);
    assert!(err.is_corruption());
}

#[test]
fn test_decode_capacity() {
    let data = compressible_bytes(2 * BLOCK as usize + 7);
    let encoded = encode(zstd(), &data, &file_opts()).unwrap();
    let opts = DecodeOptions::default();

    assert_eq!(
        scan_decoded_size(zstd().as_ref(), &encoded, &opts).unwrap(),
        data.len() as u64
    );
    assert_eq!(decode_with_capacity(zstd(), &encoded, data.len(), &opts).unwrap(), data);

    let err = decode_with_capacity(zstd(), &encoded, data.len() - 1, &opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataTooBig);
}

#[test]
fn test_encode_capacity() {
    let data = compressible_bytes(1000);
    let opts = file_opts();

    let err = encode_with_capacity(passthrough(), &data, FILE_HEADER_LEN - 1, &opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InitError);

    let exact = FILE_HEADER_LEN + BLOCK_HEADER_LEN + data.len();
    assert_eq!(
        encoded_bound(passthrough().as_ref(), data.len(), &opts).unwrap(),
        exact
    );
    let encoded = encode_with_capacity(passthrough(), &data, exact, &opts).unwrap();
    assert_eq!(encoded.len(), exact);

    let err = encode_with_capacity(passthrough(), &data, exact - 1, &opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataTooBig);
}

#[test]
fn test_block_size_above_maximum_is_init_error() {
    let opts = EncodeOptions::default().with_block_size(BLOCKSIZE_MAX + 1);
    let err = encode(zstd(), b"x", &opts).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InitError);
}

#[test]
fn test_inspect_reports_segments() {
    let data = compressible_bytes(BLOCK as usize + 500);
    let encoded = encode(zstd(), &data, &frame_opts()).unwrap();
    let segments = inspect(zstd().as_ref(), &encoded, &frame_decode()).unwrap();

    assert_eq!(segments.len(), 1);
    let segment = &segments[0];
    assert_eq!(segment.offset, 0);
    assert_eq!(segment.header.block_count, Some(2));
    assert_eq!(segment.blocks[0].offset, FRAME_HEADER_LEN);
    assert_eq!(segment.original_size(), data.len() as u64);
    assert_eq!(
        segment.packed_size() as usize + FRAME_HEADER_LEN + 2 * BLOCK_HEADER_LEN,
        encoded.len()
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_batch_roundtrip(
        len in 0usize..300_000,
        seed in any::<u64>(),
        block_size in BLOCKSIZE_MIN..200_000u32,
        frame in any::<bool>(),
    ) {
        let data = pseudo_random_bytes(len, seed);
        let format = if frame { Format::Frame } else { Format::File };
        let enc = EncodeOptions::default().with_block_size(block_size).with_format(format);
        let dec = DecodeOptions::default().with_format(format);

        let encoded = encode(passthrough(), &data, &enc).unwrap();
        prop_assert!(encoded.len() <= encoded_bound(passthrough().as_ref(), len, &enc).unwrap());
        prop_assert_eq!(decode(passthrough(), &encoded, &dec).unwrap(), data);
    }
}
