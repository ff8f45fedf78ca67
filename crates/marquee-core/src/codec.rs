//! gzip stream compression for cache payloads.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// gzip compression level (0 = store, 9 = best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    pub const MAX: u32 = 9;

    pub const fn fastest() -> Self {
        Self(1)
    }

    pub const fn best() -> Self {
        Self(Self::MAX)
    }

    /// Returns `None` when the level is above [`Self::MAX`].
    pub fn new(level: u32) -> Option<Self> {
        (level <= Self::MAX).then_some(Self(level))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::fastest()
    }
}

/// Largest stream [`Codec::decompress`] inflates unless configured otherwise.
pub const DEFAULT_MAX_DECOMPRESSED: usize = 16 * 1024 * 1024;

/// Stateless gzip codec.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    level: CompressionLevel,
    max_decompressed: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(CompressionLevel::default())
    }
}

impl Codec {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            level,
            max_decompressed: DEFAULT_MAX_DECOMPRESSED,
        }
    }

    /// Bound the inflated size; larger streams are rejected as corrupt.
    pub fn with_max_decompressed(mut self, limit: usize) -> Self {
        self.max_decompressed = limit;
        self
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    pub fn max_decompressed(&self) -> usize {
        self.max_decompressed
    }

    /// Compress `data` into a complete gzip stream.
    ///
    /// Empty input produces a valid (header-only) stream.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(data.len() / 2 + 32),
            Compression::new(self.level.get()),
        );
        encoder
            .write_all(data)
            .map_err(|e| CodecError::Compress(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CodecError::Compress(e.to_string()))
    }

    /// Decompress a gzip stream produced by [`Codec::compress`].
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        if data.is_empty() {
            return Err(CodecError::Empty);
        }

        let limit = self.max_decompressed;
        // One byte past the limit is enough to detect an overrun
        let mut decoder = GzDecoder::new(data).take(limit as u64 + 1);
        let mut out = Vec::with_capacity(data.len().saturating_mul(4).min(limit));
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Corrupt(e.to_string()))?;
        if out.len() > limit {
            return Err(CodecError::Corrupt(format!(
                "decompressed size exceeds {limit} bytes"
            )));
        }
        Ok(out)
    }
}
