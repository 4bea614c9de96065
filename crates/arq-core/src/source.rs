//! Ready-made [`DataSource`] implementations.

use arq_abstract::DataSource;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io;
use std::path::Path;

/// Default chunk size, small enough to fit a typical path MTU with headers.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Pseudo-random payloads derived from the seqno, so any chunk can be
/// regenerated for a retransmission without caching it.
#[derive(Debug, Clone)]
pub struct PatternSource {
    chunk_size: usize,
    seed: u64,
}

impl PatternSource {
    pub fn new(chunk_size: usize, seed: u64) -> Self {
        Self { chunk_size, seed }
    }
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, 0)
    }
}

impl DataSource for PatternSource {
    fn payload(&mut self, seqno: u32) -> Bytes {
        let mut rng = StdRng::seed_from_u64(self.seed ^ u64::from(seqno));
        let mut chunk = vec![0u8; self.chunk_size];
        rng.fill(&mut chunk[..]);
        Bytes::from(chunk)
    }
}

/// Fragments an in-memory buffer into fixed-size chunks, one per seqno.
#[derive(Debug, Clone)]
pub struct ChunkSource {
    data: Bytes,
    chunk_size: usize,
}

impl ChunkSource {
    pub fn new(data: impl Into<Bytes>, chunk_size: usize) -> Self {
        Self {
            data: data.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_file(path: impl AsRef<Path>, chunk_size: usize) -> io::Result<Self> {
        Ok(Self::new(fs::read(path)?, chunk_size))
    }
}

impl DataSource for ChunkSource {
    fn payload(&mut self, seqno: u32) -> Bytes {
        let start = (seqno as usize).saturating_mul(self.chunk_size);
        if start >= self.data.len() {
            return Bytes::new();
        }
        let end = (start + self.chunk_size).min(self.data.len());
        self.data.slice(start..end)
    }

    fn chunk_count(&self) -> Option<u32> {
        Some(self.data.len().div_ceil(self.chunk_size) as u32)
    }
}
