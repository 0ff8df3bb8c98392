mod deflate_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use deflate_codec::DeflateCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use bz3_core::{Codec, Error, Result};
use log::debug;

/// Names accepted by [`codec_by_name`], for help text.
pub const CODEC_NAMES: &[&str] = &["passthrough", "zstd", "lz4", "deflate"];

/// Resolve a codec by name.
///
/// The container header does not record which codec produced it, so the CLI
/// calls this for both directions. `level` is only used by zstd and deflate;
/// `None` picks each codec's default.
pub fn codec_by_name(name: &str, level: Option<i32>) -> Result<Arc<dyn Codec>> {
    let codec: Arc<dyn Codec> = match name {
        "passthrough" | "none" => Arc::new(PassThroughCodec),
        "zstd" => {
            let level = level.unwrap_or(ZstdCodec::default().level);
            let range = zstd::compression_level_range();
            if !range.contains(&level) {
                return Err(Error::InitError(format!(
                    "zstd level {} outside {}..={}",
                    level,
                    range.start(),
                    range.end()
                )));
            }
            Arc::new(ZstdCodec::new(level))
        }
        "lz4" => Arc::new(Lz4Codec),
        "deflate" | "zlib" => {
            let level = level.unwrap_or(DeflateCodec::default().level as i32);
            if !(0..=9).contains(&level) {
                return Err(Error::InitError(format!(
                    "deflate level {} outside 0..=9",
                    level
                )));
            }
            Arc::new(DeflateCodec::new(level as u32))
        }
        other => {
            return Err(Error::InitError(format!(
                "unknown codec '{}'; valid options: {}",
                other,
                CODEC_NAMES.join(", ")
            )))
        }
    };
    debug!("resolved codec '{}' as {}", name, codec.name());
    Ok(codec)
}
