use crate::format::{Format, DEFAULT_BLOCK_SIZE};

/// Settings for the batch encoder and the streaming [`Encoder`](crate::Encoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Original bytes per block. Raised to `BLOCKSIZE_MIN` when smaller.
    pub block_size: u32,
    /// Header variant to emit. The streaming encoder only writes `Format::File`.
    pub format: Format,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            format: Format::File,
        }
    }
}

impl EncodeOptions {
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }
}

/// Settings for the batch decoder and the streaming [`Decoder`](crate::Decoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Largest block size a stream header may declare.
    pub max_block_size: u32,
    /// Header variant expected in the input.
    pub format: Format,
    /// Keep decoding directly appended segments instead of stopping after the first.
    pub concat: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_BLOCK_SIZE,
            format: Format::File,
            concat: true,
        }
    }
}

impl DecodeOptions {
    pub fn with_max_block_size(mut self, max_block_size: u32) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn with_concat(mut self, concat: bool) -> Self {
        self.concat = concat;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let enc = EncodeOptions::default();
        assert_eq!(enc.block_size, 16 << 20);
        assert_eq!(enc.format, Format::File);

        let dec = DecodeOptions::default();
        assert_eq!(dec.max_block_size, 16 << 20);
        assert!(dec.concat);
    }

    #[test]
    fn setters_chain() {
        let dec = DecodeOptions::default()
            .with_format(Format::Frame)
            .with_concat(false)
            .with_max_block_size(1 << 20);
        assert_eq!(dec.format, Format::Frame);
        assert!(!dec.concat);
        assert_eq!(dec.max_block_size, 1 << 20);
    }
}
