#![allow(dead_code)]

use std::io::{self, Read};
use std::sync::Arc;

use bz3_codecs::{PassThroughCodec, ZstdCodec};
use bz3_core::Codec;

/// Generate `len` deterministic bytes using a simple LCG.
pub fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
pub fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

pub fn zstd() -> Arc<dyn Codec> {
    Arc::new(ZstdCodec::default())
}

pub fn passthrough() -> Arc<dyn Codec> {
    Arc::new(PassThroughCodec)
}

/// Hands out at most one byte per call.
pub struct OneByteReader<R>(pub R);

impl<R: Read> Read for OneByteReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(1);
        self.0.read(&mut buf[..len])
    }
}

/// Fails every other call with `Interrupted`.
pub struct InterruptingReader<R> {
    pub inner: R,
    pub tick: bool,
}

impl<R: Read> Read for InterruptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.tick = !self.tick;
        if self.tick {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "try again"));
        }
        self.inner.read(buf)
    }
}

/// Claims to have read one byte more than it was asked for.
pub struct OverrunReader;

impl Read for OverrunReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(buf.len() + 1)
    }
}
