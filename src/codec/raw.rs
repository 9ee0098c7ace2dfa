//! Uncompressed frame "codec".
//!
//! Raw output frames are the interleaved 8-bit RGB samples themselves; the
//! instance builder concatenates them into a single native pixel-data
//! element.

use bytes::Bytes;

/// Copy interleaved RGB bytes into an owned frame payload.
pub fn encode_raw(rgb: &[u8]) -> Bytes {
    Bytes::copy_from_slice(rgb)
}
