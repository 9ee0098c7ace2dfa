//! Lossless in-memory compression for transient raw-frame caches.
//!
//! When a pyramid level will be consumed by the next level (progressive
//! downsampling), every frame keeps a compressed copy of its raw pixels
//! until the last reader releases it. Deflate keeps that footprint small;
//! the round trip is size-preserving.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::CodecError;

/// Compress a byte buffer.
pub fn compress_bytes(raw: &[u8]) -> Result<Bytes, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(Bytes::from(compressed))
}

/// Decompress into a buffer of exactly `expected_size` bytes.
pub fn decompress_bytes(compressed: &[u8], expected_size: usize) -> Result<Vec<u8>, CodecError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut raw = vec![0u8; expected_size];
    decoder
        .read_exact(&mut raw)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    // A trailing read must yield nothing, otherwise the size lied.
    let mut overflow = [0u8; 1];
    match decoder.read(&mut overflow) {
        Ok(0) => Ok(raw),
        Ok(_) => Err(CodecError::SizeMismatch {
            expected: expected_size,
            actual: expected_size + 1,
        }),
        Err(e) => Err(CodecError::Decode(e.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================
