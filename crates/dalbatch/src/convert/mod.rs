//! Texture conversion
//!
//! Turns planned [`ConversionTask`](crate::plan::ConversionTask)s into
//! container files in the cache. Sources the codec cannot read are first
//! re-encoded to PNG.

mod executor;
mod intermediate;
mod standalone;

pub use executor::*;
pub use intermediate::{NATIVE_CODEC_EXTENSIONS, accepts_natively, encode_intermediate};
pub use standalone::{StandaloneSource, collect_sources, detect_channel_layout, standalone_task};
