//! Compressed Frame Format
//!
//! Every compressed buffer starts with a 12-byte self-describing header:
//!
//! ```text
//! offset 0..3   magic          b"VN01" | b"VZ01" | b"VL01" | b"VS01" | b"VB01" | b"VX01"
//! offset 4..7   original size  u32 little-endian, truncated to u32::MAX
//! offset 8..11  crc32          u32 little-endian, IEEE polynomial, over the original bytes
//! offset 12..   payload        algorithm output, or the raw bytes when magic = VN01
//! ```
//!
//! The header makes decompression transparent: the algorithm is read back
//! from the magic, never passed by the caller.

use serde::{Deserialize, Serialize};

/// Header length in bytes.
pub const HEADER_SIZE: usize = 12;

// ============================================================================
// ALGORITHMS
// ============================================================================

/// Compression algorithm identifier.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algo {
    /// Stored uncompressed
    None,
    /// zlib (flate2) - default, no native deps beyond miniz
    Zlib,
    /// LZ4 block format - fastest, light compression
    Lz4,
    /// Zstandard - best ratio/speed trade-off
    Zstd,
    /// bzip2 - high ratio, slow (feature `bz2`)
    Bz2,
    /// lzma/xz - maximum ratio, very slow (feature `lzma`)
    Lzma,
}

impl Algo {
    /// The 4-byte magic identifying this algorithm in a frame header.
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Algo::None => *b"VN01",
            Algo::Zlib => *b"VZ01",
            Algo::Lz4 => *b"VL01",
            Algo::Zstd => *b"VS01",
            Algo::Bz2 => *b"VB01",
            Algo::Lzma => *b"VX01",
        }
    }

    /// Resolve a magic back to its algorithm.
    pub fn from_magic(magic: &[u8]) -> Option<Algo> {
        match magic {
            b"VN01" => Some(Algo::None),
            b"VZ01" => Some(Algo::Zlib),
            b"VL01" => Some(Algo::Lz4),
            b"VS01" => Some(Algo::Zstd),
            b"VB01" => Some(Algo::Bz2),
            b"VX01" => Some(Algo::Lzma),
            _ => None,
        }
    }

    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algo::None => "none",
            Algo::Zlib => "zlib",
            Algo::Lz4 => "lz4",
            Algo::Zstd => "zstd",
            Algo::Bz2 => "bz2",
            Algo::Lzma => "lzma",
        }
    }

    /// Parse from a lowercase name.
    pub fn parse_name(s: &str) -> Option<Algo> {
        match s {
            "none" => Some(Algo::None),
            "zlib" => Some(Algo::Zlib),
            "lz4" => Some(Algo::Lz4),
            "zstd" => Some(Algo::Zstd),
            "bz2" => Some(Algo::Bz2),
            "lzma" | "xz" => Some(Algo::Lzma),
            _ => None,
        }
    }
}

impl std::fmt::Display for Algo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// HEADER
// ============================================================================

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Algorithm read from the magic
    pub algo: Algo,
    /// Original (uncompressed) size, truncated to u32
    pub original_size: u32,
    /// CRC32 of the original bytes
    pub crc32: u32,
}

impl FrameHeader {
    /// Serialize to the 12-byte wire form.
    pub fn pack(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.algo.magic());
        out[4..8].copy_from_slice(&self.original_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.crc32.to_le_bytes());
        out
    }

    /// Parse from the first 12 bytes of a frame. Returns None when the
    /// buffer is too short or carries an unknown magic.
    pub fn unpack(bytes: &[u8]) -> Option<FrameHeader> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let algo = Algo::from_magic(&bytes[0..4])?;
        let original_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let crc32 = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        Some(FrameHeader {
            algo,
            original_size,
            crc32,
        })
    }

    /// Build a header for `data` compressed with `algo`.
    pub fn for_data(algo: Algo, data: &[u8]) -> FrameHeader {
        FrameHeader {
            algo,
            original_size: data.len().min(u32::MAX as usize) as u32,
            crc32: crc32fast::hash(data),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_roundtrip() {
        for algo in [
            Algo::None,
            Algo::Zlib,
            Algo::Lz4,
            Algo::Zstd,
            Algo::Bz2,
            Algo::Lzma,
        ] {
            assert_eq!(Algo::from_magic(&algo.magic()), Some(algo));
            assert_eq!(Algo::parse_name(algo.as_str()), Some(algo));
        }
    }

    #[test]
    fn test_unknown_magic_rejected() {
        assert_eq!(Algo::from_magic(b"ZZ99"), None);
        assert!(FrameHeader::unpack(b"ZZ99\x00\x00\x00\x00\x00\x00\x00\x00").is_none());
    }

    #[test]
    fn test_header_pack_unpack() {
        let header = FrameHeader {
            algo: Algo::Zstd,
            original_size: 12_345,
            crc32: 0xDEAD_BEEF,
        };
        let packed = header.pack();
        assert_eq!(&packed[0..4], b"VS01");
        assert_eq!(FrameHeader::unpack(&packed), Some(header));
    }

    #[test]
    fn test_header_for_data_fields() {
        let data = b"hello world ".repeat(1024);
        let header = FrameHeader::for_data(Algo::Zstd, &data);
        assert_eq!(header.original_size as usize, data.len());
        assert_eq!(header.crc32, crc32fast::hash(&data));
    }

    #[test]
    fn test_short_buffer() {
        assert!(FrameHeader::unpack(b"VS01").is_none());
    }
}
