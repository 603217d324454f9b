//! Byte Compression
//!
//! Multi-algorithm compression behind a 12-byte self-describing frame
//! header with CRC32 integrity, plus profile-based selection, streaming,
//! dictionary compression and an integrated benchmark.

mod batch;
mod compressor;
mod frame;

pub use batch::BatchCompressor;
pub use compressor::{
    available_algorithms, profile, BenchmarkEntry, CompressionError, CompressionProfile,
    CompressionReport, Compressor, Result, SelectPreference, PROFILES,
};
pub use frame::{Algo, FrameHeader, HEADER_SIZE};

use once_cell::sync::Lazy;

static DEFAULT_COMPRESSOR: Lazy<Compressor> = Lazy::new(Compressor::new);

/// Process-wide default compressor.
pub fn get_compressor() -> &'static Compressor {
    &DEFAULT_COMPRESSOR
}

/// Shortcut: compress with a named profile through the default compressor.
pub fn compress(data: &[u8], profile_name: &str) -> Result<Vec<u8>> {
    get_compressor().compress_profile(data, profile_name)
}

/// Shortcut: transparently decompress through the default compressor.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    get_compressor().decompress(data)
}
