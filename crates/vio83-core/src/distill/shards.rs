//! Vector Shard Files
//!
//! L2 vectors are raw int8 bytes appended to shard files under
//! `embeddings/`; the database row stores (file, offset, size, norm). Shards
//! roll over at a fixed size so no single file grows unbounded, and a shard
//! is never rewritten, only appended to.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use super::{DistillError, Result};

/// Shard rollover threshold: 256 MB.
const MAX_SHARD_BYTES: u64 = 256 * 1024 * 1024;

/// Append-only storage for quantized vectors.
#[derive(Debug)]
pub struct VectorShardStore {
    dir: PathBuf,
    current_index: u32,
    current_size: u64,
    max_shard_bytes: u64,
}

fn shard_name(index: u32) -> String {
    format!("shard_{index:04}.vec")
}

impl VectorShardStore {
    /// Open (or create) the shard directory, resuming the newest shard.
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;

        let mut newest: Option<(u32, u64)> = None;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(index) = name
                .strip_prefix("shard_")
                .and_then(|s| s.strip_suffix(".vec"))
                .and_then(|s| s.parse::<u32>().ok())
            {
                let size = entry.metadata()?.len();
                if newest.map(|(i, _)| index > i).unwrap_or(true) {
                    newest = Some((index, size));
                }
            }
        }

        let (current_index, current_size) = newest.unwrap_or((0, 0));
        Ok(Self {
            dir,
            current_index,
            current_size,
            max_shard_bytes: MAX_SHARD_BYTES,
        })
    }

    #[cfg(test)]
    fn with_max_bytes(mut self, max: u64) -> Self {
        self.max_shard_bytes = max;
        self
    }

    /// Append vector bytes, returning (shard file name, offset).
    pub fn append(&mut self, bytes: &[u8]) -> Result<(String, u64)> {
        if self.current_size + bytes.len() as u64 > self.max_shard_bytes && self.current_size > 0 {
            self.current_index += 1;
            self.current_size = 0;
        }

        let name = shard_name(self.current_index);
        let path = self.dir.join(&name);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(bytes)?;
        self.current_size = offset + bytes.len() as u64;

        Ok((name, offset))
    }

    /// Read `size` vector bytes back from a shard.
    pub fn read(&self, shard_file: &str, offset: u64, size: usize) -> Result<Vec<u8>> {
        let path = self.dir.join(shard_file);
        let mut file = File::open(&path).map_err(|e| {
            DistillError::Init(format!("shard {shard_file} unreadable: {e}"))
        })?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut shards = VectorShardStore::open(dir.path().to_path_buf()).unwrap();

        let a = vec![1u8, 2, 3, 4];
        let b = vec![9u8, 8, 7, 6, 5];
        let (file_a, off_a) = shards.append(&a).unwrap();
        let (file_b, off_b) = shards.append(&b).unwrap();

        assert_eq!(file_a, file_b);
        assert_eq!(off_a, 0);
        assert_eq!(off_b, 4);
        assert_eq!(shards.read(&file_a, off_a, 4).unwrap(), a);
        assert_eq!(shards.read(&file_b, off_b, 5).unwrap(), b);
    }

    #[test]
    fn test_rollover() {
        let dir = tempfile::tempdir().unwrap();
        let mut shards = VectorShardStore::open(dir.path().to_path_buf())
            .unwrap()
            .with_max_bytes(10);

        let (file_a, _) = shards.append(&[0u8; 8]).unwrap();
        let (file_b, off_b) = shards.append(&[1u8; 8]).unwrap();
        assert_ne!(file_a, file_b);
        assert_eq!(off_b, 0);
    }

    #[test]
    fn test_resume_appends_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut shards = VectorShardStore::open(dir.path().to_path_buf()).unwrap();
            shards.append(&[7u8; 16]).unwrap();
        }
        let mut shards = VectorShardStore::open(dir.path().to_path_buf()).unwrap();
        let (_, offset) = shards.append(&[8u8; 16]).unwrap();
        assert_eq!(offset, 16);
    }
}
