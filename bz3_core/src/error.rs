//! Error type shared by every framing, batch, and streaming operation.

use std::io;

use thiserror::Error;

/// Every way a BZ3v1 operation can fail.
///
/// Framing failures name the invariant that was violated so callers can tell
/// corrupted input apart from misconfiguration (see [`Error::is_corruption`]).
#[derive(Debug, Error)]
pub enum Error {
    /// Bad signature, or a block size / block count outside the accepted range.
    #[error("malformed header: {0}")]
    MalformedHeader(String),

    /// Input ended before a block or frame promised by its declared length.
    #[error("truncated data: {0}")]
    TruncatedData(String),

    /// A declared or actual size exceeds a configured or absolute bound.
    #[error("data too big: {0}")]
    DataTooBig(String),

    /// A block handed to the compressor is larger than its configured capacity.
    #[error("source too large: {len} bytes exceeds block size {block_size}")]
    SourceTooLarge { len: usize, block_size: u32 },

    /// A block size exceeds the configured maximum.
    #[error("block size {block_size} is out of bounds (configured maximum {max})")]
    OutOfBounds { block_size: u32, max: u32 },

    /// The byte source signalled end-of-input in the middle of a block payload.
    #[error("unexpected end of input: expected {expected} payload bytes, received {received}")]
    UnexpectedEof { expected: usize, received: usize },

    /// Invalid configuration (block size, format tag, output capacity).
    #[error("initialization error: {0}")]
    InitError(String),

    /// Failure reported by the block compressor backend, passed through unchanged.
    #[error("{codec} codec error: {message}")]
    Codec { codec: &'static str, message: String },

    /// The byte source returned more bytes than were requested.
    #[error("byte source returned {returned} bytes but only {requested} were requested")]
    SourceOverrun { requested: usize, returned: usize },

    /// Operation on a closed encoder or decoder.
    #[error("stream is closed")]
    Closed,

    /// Operation on an encoder or decoder that already failed.
    #[error("stream is unusable after an earlier error")]
    Poisoned,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Fieldless discriminant of [`Error`], convenient for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedHeader,
    TruncatedData,
    DataTooBig,
    SourceTooLarge,
    OutOfBounds,
    UnexpectedEof,
    InitError,
    Codec,
    SourceOverrun,
    Closed,
    Poisoned,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedHeader(_) => ErrorKind::MalformedHeader,
            Error::TruncatedData(_) => ErrorKind::TruncatedData,
            Error::DataTooBig(_) => ErrorKind::DataTooBig,
            Error::SourceTooLarge { .. } => ErrorKind::SourceTooLarge,
            Error::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Error::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
            Error::InitError(_) => ErrorKind::InitError,
            Error::Codec { .. } => ErrorKind::Codec,
            Error::SourceOverrun { .. } => ErrorKind::SourceOverrun,
            Error::Closed => ErrorKind::Closed,
            Error::Poisoned => ErrorKind::Poisoned,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// True when the error describes damaged or non-conforming input rather
    /// than a caller mistake or an environment failure.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedHeader
                | ErrorKind::TruncatedData
                | ErrorKind::DataTooBig
                | ErrorKind::UnexpectedEof
                | ErrorKind::Codec
        )
    }

    /// Wrap a backend failure.
    pub fn codec(codec: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Codec {
            codec,
            message: err.to_string(),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => {
                let kind = match other.kind() {
                    ErrorKind::TruncatedData | ErrorKind::UnexpectedEof => io::ErrorKind::UnexpectedEof,
                    ErrorKind::InitError | ErrorKind::SourceTooLarge | ErrorKind::OutOfBounds => {
                        io::ErrorKind::InvalidInput
                    }
                    ErrorKind::Closed | ErrorKind::Poisoned => io::ErrorKind::BrokenPipe,
                    ErrorKind::SourceOverrun => io::ErrorKind::Other,
                    _ => io::ErrorKind::InvalidData,
                };
                io::Error::new(kind, other)
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_and_misconfiguration_are_distinguished() {
        assert!(Error::MalformedHeader("bad signature".into()).is_corruption());
        assert!(Error::TruncatedData("short".into()).is_corruption());
        assert!(!Error::OutOfBounds { block_size: 1 << 20, max: 65 << 10 }.is_corruption());
        assert!(!Error::InitError("capacity".into()).is_corruption());
        assert!(!Error::Closed.is_corruption());
    }

    #[test]
    fn io_conversion_keeps_the_typed_error() {
        let io_err: io::Error = Error::TruncatedData("payload".into()).into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
        let inner = io_err.into_inner().unwrap().downcast::<Error>().unwrap();
        assert_eq!(inner.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn io_errors_unwrap_on_conversion() {
        let original = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let io_err: io::Error = Error::from(original).into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
    }
}
