//! Multi-Algorithm Compressor
//!
//! Compresses byte buffers behind the self-describing frame header defined in
//! [`frame`](super::frame). zlib, zstd and lz4 are always compiled in; bz2 and
//! lzma sit behind the `bz2` / `lzma` features. Decompressing a frame whose
//! algorithm is not compiled in fails with `UnsupportedAlgorithm` rather than
//! guessing.
//!
//! Profiles map intent ("text", "metadata", "archive", ...) to concrete
//! (algorithm, level) pairs; `select_best` benchmarks candidates on a sample
//! when no profile fits.

use std::io::{Read, Write};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::frame::{Algo, FrameHeader, HEADER_SIZE};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Compression error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// Frame header, magic or CRC32 mismatch
    #[error("corrupted frame: {0}")]
    CorruptedFrame(String),
    /// Frame requires an algorithm that is not compiled in
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compression result type
pub type Result<T> = std::result::Result<T, CompressionError>;

// ============================================================================
// PROFILES
// ============================================================================

/// A named (algorithm, level) pair tuned for a class of data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompressionProfile {
    /// Human name, e.g. "text"
    pub name: &'static str,
    /// Algorithm to use
    pub algo: Algo,
    /// Algorithm level
    pub level: i32,
    /// What the profile is for
    pub description: &'static str,
}

/// Predefined profiles, keyed by name via [`profile`].
pub const PROFILES: &[CompressionProfile] = &[
    CompressionProfile { name: "fastest", algo: Algo::Lz4, level: 0, description: "Maximum speed, light compression" },
    CompressionProfile { name: "fast", algo: Algo::Zstd, level: 1, description: "Fast with decent compression" },
    CompressionProfile { name: "balanced", algo: Algo::Zstd, level: 3, description: "Balanced speed/ratio" },
    CompressionProfile { name: "default", algo: Algo::Zlib, level: 6, description: "zlib default, always available" },
    CompressionProfile { name: "high", algo: Algo::Zstd, level: 9, description: "High compression, moderately slow" },
    CompressionProfile { name: "maximum", algo: Algo::Lzma, level: 6, description: "Maximum compression, slow" },
    CompressionProfile { name: "archive", algo: Algo::Lzma, level: 9, description: "Archival, maximum compression" },
    CompressionProfile { name: "text", algo: Algo::Zstd, level: 5, description: "Tuned for prose" },
    CompressionProfile { name: "embeddings", algo: Algo::Lz4, level: 0, description: "Tuned for numeric vectors" },
    CompressionProfile { name: "metadata", algo: Algo::Zlib, level: 9, description: "Compact JSON metadata" },
];

/// Look up a profile by name, falling back to "default".
pub fn profile(name: &str) -> &'static CompressionProfile {
    PROFILES
        .iter()
        .find(|p| p.name == name)
        .unwrap_or_else(|| &PROFILES[3])
}

/// Which algorithms this build can actually run.
pub fn available_algorithms() -> Vec<(Algo, bool)> {
    vec![
        (Algo::Zlib, true),
        (Algo::Lz4, true),
        (Algo::Zstd, true),
        (Algo::Bz2, cfg!(feature = "bz2")),
        (Algo::Lzma, cfg!(feature = "lzma")),
    ]
}

// ============================================================================
// REPORTS
// ============================================================================

/// Outcome of a (streaming) compression run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionReport {
    /// Algorithm used
    pub algo: Algo,
    /// Level used
    pub level: i32,
    /// Bytes in
    pub original_size: u64,
    /// Bytes out
    pub compressed_size: u64,
    /// compressed / original, < 1.0 is good
    pub ratio: f64,
    /// Wall time in milliseconds
    pub time_ms: f64,
    /// Input throughput in MB/s
    pub throughput_mbps: f64,
}

/// One benchmark measurement over a (algo, level) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkEntry {
    /// Algorithm measured
    pub algo: Algo,
    /// Level measured
    pub level: i32,
    /// Input size in bytes
    pub original_bytes: u64,
    /// Output size in bytes
    pub compressed_bytes: u64,
    /// compressed / original
    pub ratio: f64,
    /// Percent saved
    pub savings_pct: f64,
    /// Mean compression time (ms)
    pub compress_ms: f64,
    /// Mean decompression time (ms)
    pub decompress_ms: f64,
}

/// Preference for [`Compressor::select_best`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectPreference {
    /// Minimize time
    Speed,
    /// Minimize output size
    Ratio,
    /// 0.6 * ratio + 0.4 * normalized time
    #[default]
    Balanced,
}

// ============================================================================
// COMPRESSOR
// ============================================================================

/// Multi-algorithm compressor with transparent frame headers.
///
/// Stateless aside from its defaults, so a single process-wide instance is
/// shared freely across threads.
#[derive(Debug, Clone)]
pub struct Compressor {
    default_algo: Algo,
    default_level: i32,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    /// Compressor with zlib level 6 defaults.
    pub fn new() -> Self {
        Self {
            default_algo: Algo::Zlib,
            default_level: 6,
        }
    }

    /// Compressor with explicit defaults.
    pub fn with_defaults(algo: Algo, level: i32) -> Self {
        Self {
            default_algo: resolve_algo(algo),
            default_level: level,
        }
    }

    /// Compress with the instance defaults.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.compress_with(data, self.default_algo, self.default_level)
    }

    /// Compress with an explicit algorithm and level.
    ///
    /// The output always carries a frame header. When the compressed payload
    /// would not be smaller than the input, the frame is written as `VN01`
    /// with the raw bytes as payload.
    pub fn compress_with(&self, data: &[u8], algo: Algo, level: i32) -> Result<Vec<u8>> {
        if data.is_empty() {
            let header = FrameHeader {
                algo: Algo::None,
                original_size: 0,
                crc32: 0,
            };
            return Ok(header.pack().to_vec());
        }

        let algo = resolve_algo(algo);
        let compressed = match algo {
            Algo::None => data.to_vec(),
            Algo::Zlib => compress_zlib(data, level)?,
            Algo::Lz4 => lz4_flex::block::compress(data),
            Algo::Zstd => zstd::bulk::compress(data, level)?,
            Algo::Bz2 => compress_bz2(data, level)?,
            Algo::Lzma => compress_lzma(data, level)?,
        };

        let mut out;
        if algo == Algo::None || compressed.len() >= data.len() {
            let header = FrameHeader::for_data(Algo::None, data);
            out = Vec::with_capacity(HEADER_SIZE + data.len());
            out.extend_from_slice(&header.pack());
            out.extend_from_slice(data);
        } else {
            let header = FrameHeader::for_data(algo, data);
            out = Vec::with_capacity(HEADER_SIZE + compressed.len());
            out.extend_from_slice(&header.pack());
            out.extend_from_slice(&compressed);
        }
        Ok(out)
    }

    /// Compress with a named profile.
    pub fn compress_profile(&self, data: &[u8], profile_name: &str) -> Result<Vec<u8>> {
        let p = profile(profile_name);
        self.compress_with(data, p.algo, p.level)
    }

    /// Decompress a framed buffer, selecting the branch by magic.
    ///
    /// A buffer shorter than a header is returned unchanged (headerless raw
    /// data). A recognized header whose payload or CRC does not check out
    /// fails with `CorruptedFrame`; a header naming an algorithm that is not
    /// compiled in fails with `UnsupportedAlgorithm`.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < HEADER_SIZE {
            return Ok(data.to_vec());
        }

        let header = FrameHeader::unpack(data)
            .ok_or_else(|| CompressionError::CorruptedFrame("unknown magic".into()))?;
        let payload = &data[HEADER_SIZE..];

        let result = match header.algo {
            Algo::None => payload.to_vec(),
            Algo::Zlib => decompress_zlib(payload)?,
            Algo::Lz4 => lz4_flex::block::decompress(payload, header.original_size as usize)
                .map_err(|e| CompressionError::CorruptedFrame(format!("lz4: {e}")))?,
            Algo::Zstd => zstd::bulk::decompress(payload, header.original_size as usize)
                .map_err(|e| CompressionError::CorruptedFrame(format!("zstd: {e}")))?,
            Algo::Bz2 => decompress_bz2(payload)?,
            Algo::Lzma => decompress_lzma(payload)?,
        };

        let actual = crc32fast::hash(&result);
        if header.crc32 != 0 && actual != header.crc32 {
            return Err(CompressionError::CorruptedFrame(format!(
                "crc32 mismatch: stored {:#010x}, computed {:#010x}",
                header.crc32, actual
            )));
        }

        Ok(result)
    }

    // ------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------

    /// Stream-compress `input` into `output` without buffering the whole
    /// payload.
    ///
    /// Delegates to the algorithm's native streaming format (zstd encoder,
    /// zlib stream, lz4 frame), so the output is self-terminating and carries
    /// no VIO83 frame header. Algorithms without native streaming fall back
    /// to a single buffered frame.
    pub fn compress_stream<R: Read, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
        algo: Algo,
        level: i32,
        chunk_size: usize,
    ) -> Result<CompressionReport> {
        let algo = resolve_algo(algo);
        let started = Instant::now();
        let mut total_in: u64 = 0;
        let mut counter = CountingWriter::new(output);

        match algo {
            Algo::Zlib => {
                let mut enc = flate2::write::ZlibEncoder::new(
                    &mut counter,
                    flate2::Compression::new(level.clamp(0, 9) as u32),
                );
                total_in = copy_chunks(input, &mut enc, chunk_size)?;
                enc.finish()?;
            }
            Algo::Zstd => {
                let mut enc = zstd::stream::Encoder::new(&mut counter, level)?;
                total_in = copy_chunks(input, &mut enc, chunk_size)?;
                enc.finish()?;
            }
            Algo::Lz4 => {
                let mut enc = lz4_flex::frame::FrameEncoder::new(&mut counter);
                total_in = copy_chunks(input, &mut enc, chunk_size)?;
                enc.finish()
                    .map_err(|e| CompressionError::Io(std::io::Error::other(e)))?;
            }
            _ => {
                // No native streaming: buffer and emit one frame
                let mut all = Vec::new();
                input.read_to_end(&mut all)?;
                total_in = all.len() as u64;
                let framed = self.compress_with(&all, algo, level)?;
                counter.write_all(&framed)?;
            }
        }

        let total_out = counter.written();
        let elapsed = started.elapsed().as_secs_f64();
        Ok(CompressionReport {
            algo,
            level,
            original_size: total_in,
            compressed_size: total_out,
            ratio: if total_in > 0 {
                total_out as f64 / total_in as f64
            } else {
                1.0
            },
            time_ms: elapsed * 1000.0,
            throughput_mbps: if elapsed > 0.0 {
                (total_in as f64 / (1024.0 * 1024.0)) / elapsed
            } else {
                0.0
            },
        })
    }

    // ------------------------------------------------------------------
    // Dictionary compression (zstd only)
    // ------------------------------------------------------------------

    /// Train a zstd dictionary from similar small samples.
    pub fn train_dictionary(&self, samples: &[Vec<u8>], max_size: usize) -> Result<Vec<u8>> {
        zstd::dict::from_samples(samples, max_size).map_err(CompressionError::Io)
    }

    /// Compress with a pre-trained dictionary. Output is a regular `VS01`
    /// frame; the caller must hold the same dictionary to decompress.
    pub fn compress_with_dict(&self, data: &[u8], dict: &[u8], level: i32) -> Result<Vec<u8>> {
        let mut cctx = zstd::bulk::Compressor::with_dictionary(level, dict)?;
        let compressed = cctx.compress(data)?;
        let header = FrameHeader::for_data(Algo::Zstd, data);
        let mut out = Vec::with_capacity(HEADER_SIZE + compressed.len());
        out.extend_from_slice(&header.pack());
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    /// Decompress a dictionary-compressed frame.
    pub fn decompress_with_dict(&self, data: &[u8], dict: &[u8]) -> Result<Vec<u8>> {
        let header = FrameHeader::unpack(data)
            .ok_or_else(|| CompressionError::CorruptedFrame("unknown magic".into()))?;
        if header.algo != Algo::Zstd {
            return Err(CompressionError::CorruptedFrame(format!(
                "dictionary frames are zstd, found {}",
                header.algo
            )));
        }
        let payload = &data[HEADER_SIZE..];

        let mut dctx = zstd::bulk::Decompressor::with_dictionary(dict)?;
        let result = dctx
            .decompress(payload, header.original_size as usize)
            .map_err(|e| CompressionError::CorruptedFrame(format!("zstd: {e}")))?;

        let actual = crc32fast::hash(&result);
        if header.crc32 != 0 && actual != header.crc32 {
            return Err(CompressionError::CorruptedFrame("crc32 mismatch".into()));
        }
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Auto-selection / benchmark
    // ------------------------------------------------------------------

    /// Try candidate algorithms on a sample and pick the best (algo, level).
    pub fn select_best(
        &self,
        sample: &[u8],
        candidates: Option<&[Algo]>,
        prefer: SelectPreference,
    ) -> (Algo, i32) {
        let default_candidates: Vec<Algo> = available_algorithms()
            .into_iter()
            .filter(|(_, ok)| *ok)
            .map(|(a, _)| a)
            .collect();
        let candidates = candidates.unwrap_or(&default_candidates);

        // (algo, level, ratio, seconds)
        let mut measured: Vec<(Algo, i32, f64, f64)> = Vec::new();
        for &algo in candidates {
            if resolve_algo(algo) != algo {
                continue;
            }
            for &level in test_levels(algo) {
                let t0 = Instant::now();
                let Ok(compressed) = self.compress_with(sample, algo, level) else {
                    continue;
                };
                let elapsed = t0.elapsed().as_secs_f64();
                let ratio = if sample.is_empty() {
                    1.0
                } else {
                    compressed.len() as f64 / sample.len() as f64
                };
                measured.push((algo, level, ratio, elapsed));
            }
        }

        if measured.is_empty() {
            return (Algo::Zlib, 6);
        }

        match prefer {
            SelectPreference::Speed => {
                measured.sort_by(|a, b| a.3.total_cmp(&b.3));
            }
            SelectPreference::Ratio => {
                measured.sort_by(|a, b| a.2.total_cmp(&b.2));
            }
            SelectPreference::Balanced => {
                let max_time = measured.iter().map(|m| m.3).fold(f64::MIN, f64::max).max(1e-9);
                measured
                    .sort_by(|a, b| score(a, max_time).total_cmp(&score(b, max_time)));
            }
        }

        let best = measured[0];
        tracing::info!(
            algo = %best.0,
            level = best.1,
            ratio = format!("{:.3}", best.2),
            time_ms = format!("{:.1}", best.3 * 1000.0),
            "selected compression algorithm"
        );
        (best.0, best.1)
    }

    /// Benchmark all compiled-in algorithms over real data.
    ///
    /// Entries come back sorted by ratio ascending.
    pub fn benchmark(
        &self,
        data: &[u8],
        algos: Option<&[Algo]>,
        iterations: usize,
    ) -> Result<Vec<BenchmarkEntry>> {
        let default_algos: Vec<Algo> = available_algorithms()
            .into_iter()
            .filter(|(_, ok)| *ok)
            .map(|(a, _)| a)
            .collect();
        let algos = algos.unwrap_or(&default_algos);
        let iterations = iterations.max(1);
        let original = data.len() as u64;

        let mut entries = Vec::new();
        for &algo in algos {
            if resolve_algo(algo) != algo {
                continue;
            }
            for &level in test_levels(algo) {
                let mut compress_total = 0.0;
                let mut decompress_total = 0.0;
                let mut compressed_len = 0u64;

                for _ in 0..iterations {
                    let t0 = Instant::now();
                    let compressed = self.compress_with(data, algo, level)?;
                    compress_total += t0.elapsed().as_secs_f64();
                    compressed_len = compressed.len() as u64;

                    let t0 = Instant::now();
                    self.decompress(&compressed)?;
                    decompress_total += t0.elapsed().as_secs_f64();
                }

                let ratio = if original > 0 {
                    compressed_len as f64 / original as f64
                } else {
                    1.0
                };
                entries.push(BenchmarkEntry {
                    algo,
                    level,
                    original_bytes: original,
                    compressed_bytes: compressed_len,
                    ratio,
                    savings_pct: (1.0 - ratio) * 100.0,
                    compress_ms: compress_total / iterations as f64 * 1000.0,
                    decompress_ms: decompress_total / iterations as f64 * 1000.0,
                });
            }
        }

        entries.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));
        Ok(entries)
    }
}

fn score(m: &(Algo, i32, f64, f64), max_time: f64) -> f64 {
    m.2 * 0.6 + (m.3 / max_time) * 0.4
}

/// Fall back to zlib when a feature-gated algorithm is not compiled in.
fn resolve_algo(algo: Algo) -> Algo {
    match algo {
        Algo::Bz2 if !cfg!(feature = "bz2") => {
            tracing::warn!("bz2 not compiled in, falling back to zlib");
            Algo::Zlib
        }
        Algo::Lzma if !cfg!(feature = "lzma") => {
            tracing::warn!("lzma not compiled in, falling back to zlib");
            Algo::Zlib
        }
        other => other,
    }
}

fn test_levels(algo: Algo) -> &'static [i32] {
    match algo {
        Algo::Lz4 => &[0],
        Algo::Zstd => &[1, 3, 7],
        Algo::Zlib => &[1, 6, 9],
        Algo::Bz2 => &[1, 5, 9],
        Algo::Lzma => &[0, 3, 6],
        Algo::None => &[0],
    }
}

// ============================================================================
// BACKENDS
// ============================================================================

fn compress_zlib(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut enc = flate2::write::ZlibEncoder::new(
        Vec::new(),
        flate2::Compression::new(level.clamp(0, 9) as u32),
    );
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

fn decompress_zlib(payload: &[u8]) -> Result<Vec<u8>> {
    let mut dec = flate2::read::ZlibDecoder::new(payload);
    let mut out = Vec::new();
    dec.read_to_end(&mut out)
        .map_err(|e| CompressionError::CorruptedFrame(format!("zlib: {e}")))?;
    Ok(out)
}

#[cfg(feature = "bz2")]
fn compress_bz2(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut enc = bzip2::write::BzEncoder::new(
        Vec::new(),
        bzip2::Compression::new(level.clamp(1, 9) as u32),
    );
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

#[cfg(not(feature = "bz2"))]
fn compress_bz2(_data: &[u8], _level: i32) -> Result<Vec<u8>> {
    Err(CompressionError::UnsupportedAlgorithm("bz2".into()))
}

#[cfg(feature = "bz2")]
fn decompress_bz2(payload: &[u8]) -> Result<Vec<u8>> {
    let mut dec = bzip2::read::BzDecoder::new(payload);
    let mut out = Vec::new();
    dec.read_to_end(&mut out)
        .map_err(|e| CompressionError::CorruptedFrame(format!("bz2: {e}")))?;
    Ok(out)
}

#[cfg(not(feature = "bz2"))]
fn decompress_bz2(_payload: &[u8]) -> Result<Vec<u8>> {
    Err(CompressionError::UnsupportedAlgorithm("bz2".into()))
}

#[cfg(feature = "lzma")]
fn compress_lzma(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut enc = xz2::write::XzEncoder::new(Vec::new(), level.clamp(0, 9) as u32);
    enc.write_all(data)?;
    Ok(enc.finish()?)
}

#[cfg(not(feature = "lzma"))]
fn compress_lzma(_data: &[u8], _level: i32) -> Result<Vec<u8>> {
    Err(CompressionError::UnsupportedAlgorithm("lzma".into()))
}

#[cfg(feature = "lzma")]
fn decompress_lzma(payload: &[u8]) -> Result<Vec<u8>> {
    let mut dec = xz2::read::XzDecoder::new(payload);
    let mut out = Vec::new();
    dec.read_to_end(&mut out)
        .map_err(|e| CompressionError::CorruptedFrame(format!("lzma: {e}")))?;
    Ok(out)
}

#[cfg(not(feature = "lzma"))]
fn decompress_lzma(_payload: &[u8]) -> Result<Vec<u8>> {
    Err(CompressionError::UnsupportedAlgorithm("lzma".into()))
}

// ============================================================================
// HELPERS
// ============================================================================

struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn copy_chunks<R: Read, W: Write>(input: &mut R, output: &mut W, chunk_size: usize) -> Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(4096)];
    let mut total = 0u64;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> Vec<u8> {
        b"hello world ".repeat(1024)
    }

    #[test]
    fn test_zstd_frame_scenario() {
        let x = sample_text();
        let comp = Compressor::new();
        let framed = comp.compress_with(&x, Algo::Zstd, 3).unwrap();

        assert!(framed.len() < x.len());
        assert_eq!(&framed[0..4], b"VS01");
        let size = u32::from_le_bytes([framed[4], framed[5], framed[6], framed[7]]);
        assert_eq!(size as usize, x.len());
        let crc = u32::from_le_bytes([framed[8], framed[9], framed[10], framed[11]]);
        assert_eq!(crc, crc32fast::hash(&x));

        assert_eq!(comp.decompress(&framed).unwrap(), x);
    }

    #[test]
    fn test_roundtrip_all_builtin_algos() {
        let data = sample_text();
        let comp = Compressor::new();
        for (algo, available) in available_algorithms() {
            if !available {
                continue;
            }
            for &level in test_levels(algo) {
                let framed = comp.compress_with(&data, algo, level).unwrap();
                assert_eq!(comp.decompress(&framed).unwrap(), data, "algo {algo}");
            }
        }
    }

    #[test]
    fn test_incompressible_stored_raw() {
        // High-entropy bytes should not shrink
        let data: Vec<u8> = (0..4096u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let comp = Compressor::new();
        let framed = comp.compress_with(&data, Algo::Zlib, 9).unwrap();
        assert_eq!(&framed[0..4], b"VN01");
        assert_eq!(&framed[HEADER_SIZE..], &data[..]);
        assert_eq!(comp.decompress(&framed).unwrap(), data);
    }

    #[test]
    fn test_single_byte_mutation_fails() {
        let data = sample_text();
        let comp = Compressor::new();
        let mut framed = comp.compress_with(&data, Algo::Zstd, 3).unwrap();
        let idx = HEADER_SIZE + framed[HEADER_SIZE..].len() / 2;
        framed[idx] ^= 0xFF;
        assert!(comp.decompress(&framed).is_err());
    }

    #[test]
    fn test_raw_frame_mutation_fails_crc() {
        let data: Vec<u8> = (0..1024u32).map(|i| (i * 7919 >> 5) as u8).collect();
        let comp = Compressor::new();
        let mut framed = comp.compress_with(&data, Algo::Zlib, 9).unwrap();
        assert_eq!(&framed[0..4], b"VN01");
        framed[HEADER_SIZE + 10] ^= 0x01;
        match comp.decompress(&framed) {
            Err(CompressionError::CorruptedFrame(_)) => {}
            other => panic!("expected CorruptedFrame, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input() {
        let comp = Compressor::new();
        let framed = comp.compress(&[]).unwrap();
        assert_eq!(framed.len(), HEADER_SIZE);
        assert_eq!(comp.decompress(&framed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_headerless_passthrough() {
        let comp = Compressor::new();
        let raw = b"short";
        assert_eq!(comp.decompress(raw).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_profiles_resolve() {
        assert_eq!(profile("text").algo, Algo::Zstd);
        assert_eq!(profile("metadata").level, 9);
        assert_eq!(profile("nope").name, "default");
    }

    #[test]
    fn test_profile_roundtrip() {
        let data = sample_text();
        let comp = Compressor::new();
        for p in PROFILES {
            let framed = comp.compress_profile(&data, p.name).unwrap();
            assert_eq!(comp.decompress(&framed).unwrap(), data, "profile {}", p.name);
        }
    }

    #[test]
    fn test_select_best_returns_candidate() {
        let data = sample_text();
        let comp = Compressor::new();
        let (algo, _level) = comp.select_best(&data, None, SelectPreference::Balanced);
        assert!(available_algorithms().iter().any(|(a, ok)| *a == algo && *ok));
    }

    #[test]
    fn test_benchmark_sorted_by_ratio() {
        let data = sample_text();
        let comp = Compressor::new();
        let entries = comp
            .benchmark(&data, Some(&[Algo::Zlib, Algo::Zstd]), 1)
            .unwrap();
        assert!(!entries.is_empty());
        for pair in entries.windows(2) {
            assert!(pair[0].ratio <= pair[1].ratio);
        }
    }

    #[test]
    fn test_stream_zstd_roundtrip() {
        let data = sample_text();
        let comp = Compressor::new();
        let mut out = Vec::new();
        let report = comp
            .compress_stream(&mut data.as_slice(), &mut out, Algo::Zstd, 3, 4096)
            .unwrap();
        assert_eq!(report.original_size as usize, data.len());
        assert!(report.compressed_size > 0);

        // Native zstd stream, decodable without the frame header
        let back = zstd::stream::decode_all(out.as_slice()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_dictionary_roundtrip() {
        let comp = Compressor::new();
        let samples: Vec<Vec<u8>> = (0..64)
            .map(|i| format!("{{\"title\":\"doc {i}\",\"category\":\"physics\"}}").into_bytes())
            .collect();
        let dict = comp.train_dictionary(&samples, 16 * 1024).unwrap();
        assert!(!dict.is_empty());

        let doc = b"{\"title\":\"doc 999\",\"category\":\"physics\"}";
        let framed = comp.compress_with_dict(doc, &dict, 3).unwrap();
        assert_eq!(comp.decompress_with_dict(&framed, &dict).unwrap(), doc);
    }
}
