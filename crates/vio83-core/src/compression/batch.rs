//! Batch Compressor
//!
//! Tuned for large batches of small, similar objects (metadata rows, JSON
//! fragments). Collects samples, trains a zstd dictionary once, then
//! compresses every object against it. Decompression transparently falls
//! back to plain frames for objects written before training.

use super::compressor::{Compressor, Result};
use super::frame::Algo;

/// Samples retained for dictionary training.
const MAX_SAMPLE_BUFFER: usize = 1000;

/// Samples actually fed to the trainer.
const TRAIN_SAMPLE_COUNT: usize = 500;

/// Dictionary-backed compressor for homogeneous small objects.
pub struct BatchCompressor {
    compressor: Compressor,
    level: i32,
    dictionary: Option<Vec<u8>>,
    sample_buffer: Vec<Vec<u8>>,
}

impl BatchCompressor {
    /// New batch compressor; `level` applies to both dict and plain paths.
    pub fn new(level: i32) -> Self {
        Self {
            compressor: Compressor::with_defaults(Algo::Zstd, level),
            level,
            dictionary: None,
            sample_buffer: Vec::new(),
        }
    }

    /// Buffer a sample for later dictionary training. Ignored once the
    /// buffer is full.
    pub fn add_sample(&mut self, data: &[u8]) {
        if self.sample_buffer.len() < MAX_SAMPLE_BUFFER {
            self.sample_buffer.push(data.to_vec());
        }
    }

    /// Train the dictionary from the buffered samples. Returns whether a
    /// dictionary is now loaded; the sample buffer is drained either way.
    pub fn train(&mut self, dict_size: usize) -> bool {
        if self.sample_buffer.is_empty() {
            return false;
        }

        let take = self.sample_buffer.len().min(TRAIN_SAMPLE_COUNT);
        let trained = self
            .compressor
            .train_dictionary(&self.sample_buffer[..take], dict_size);
        self.sample_buffer.clear();

        match trained {
            Ok(dict) => {
                tracing::info!(bytes = dict.len(), "zstd dictionary trained");
                self.dictionary = Some(dict);
                true
            }
            Err(e) => {
                tracing::warn!("dictionary training failed: {e}");
                false
            }
        }
    }

    /// Compress, using the dictionary when one is loaded.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match &self.dictionary {
            Some(dict) => self.compressor.compress_with_dict(data, dict, self.level),
            None => self.compressor.compress(data),
        }
    }

    /// Decompress; tries the dictionary first, then the plain path.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if let Some(dict) = &self.dictionary {
            if let Ok(out) = self.compressor.decompress_with_dict(data, dict) {
                return Ok(out);
            }
        }
        self.compressor.decompress(data)
    }

    /// Current dictionary bytes, for persisting alongside the data.
    pub fn dictionary(&self) -> Option<&[u8]> {
        self.dictionary.as_deref()
    }

    /// Load a previously trained dictionary.
    pub fn load_dictionary(&mut self, dict: Vec<u8>) {
        self.dictionary = Some(dict);
    }
}
