//! Frame codecs.
//!
//! One encode contract per codec: take an RGB view of a tile, return the
//! encoded bytes and the DICOM transfer syntax they belong to. Decoding is
//! only needed on the read side (existing DICOM pyramids and progressive
//! downsampling caches).

mod deflate;
mod jpeg;
mod jpeg2000;
mod raw;

pub use deflate::{compress_bytes, decompress_bytes};
pub use jpeg::{decode_jpeg, encode_jpeg, jpeg_dimensions, JpegColorSpace};
pub use jpeg2000::{decode_jp2, encode_jp2};
pub use raw::encode_raw;

use bytes::Bytes;

use crate::error::CodecError;
use crate::pixels::PixelBuffer;

/// Output frame compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// JPEG baseline (process 1), lossy, quality 1-100.
    Jpeg,
    /// JPEG 2000, lossless single-layer.
    Jpeg2000,
    /// Uncompressed little-endian 8-bit samples.
    Raw,
}

impl Codec {
    /// Parse a codec name as it appears on the command line.
    ///
    /// `none` is an alias for `raw`.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("jpeg2000") {
            Some(Codec::Jpeg2000)
        } else if lower.starts_with("jpeg") {
            Some(Codec::Jpeg)
        } else if lower.starts_with("none") || lower.starts_with("raw") {
            Some(Codec::Raw)
        } else {
            None
        }
    }

    /// DICOM transfer syntax UID for instances encoded with this codec.
    pub fn transfer_syntax(&self) -> &'static str {
        match self {
            // JPEG baseline process 1
            Codec::Jpeg => "1.2.840.10008.1.2.4.50",
            // JPEG 2000 lossless only
            Codec::Jpeg2000 => "1.2.840.10008.1.2.4.90",
            // Explicit VR little endian
            Codec::Raw => "1.2.840.10008.1.2.1",
        }
    }

    /// Whether the pixel data is written as an encapsulated sequence.
    pub fn is_encapsulated(&self) -> bool {
        !matches!(self, Codec::Raw)
    }

    /// `LossyImageCompression` value for this codec ("01" only for JPEG).
    pub fn lossy_flag(&self) -> &'static str {
        match self {
            Codec::Jpeg => "01",
            _ => "00",
        }
    }

    /// Encode a tile.
    ///
    /// The alpha channel is dropped; DICOM WSI frames carry RGB samples.
    /// `quality` only affects JPEG.
    pub fn encode(&self, tile: &PixelBuffer, quality: u8) -> Result<Bytes, CodecError> {
        let rgb = tile.to_rgb();
        match self {
            Codec::Jpeg => encode_jpeg(&rgb, tile.width(), tile.height(), quality),
            Codec::Jpeg2000 => encode_jp2(&rgb, tile.width(), tile.height()),
            Codec::Raw => Ok(encode_raw(&rgb)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_from_name() {
        assert_eq!(Codec::from_name("jpeg"), Some(Codec::Jpeg));
        assert_eq!(Codec::from_name("JPEG"), Some(Codec::Jpeg));
        assert_eq!(Codec::from_name("jpeg2000"), Some(Codec::Jpeg2000));
        assert_eq!(Codec::from_name("raw"), Some(Codec::Raw));
        assert_eq!(Codec::from_name("none"), Some(Codec::Raw));
        assert_eq!(Codec::from_name("brotli"), None);
    }

    #[test]
    fn test_transfer_syntax_mapping() {
        assert_eq!(Codec::Jpeg.transfer_syntax(), "1.2.840.10008.1.2.4.50");
        assert_eq!(Codec::Jpeg2000.transfer_syntax(), "1.2.840.10008.1.2.4.90");
        assert_eq!(Codec::Raw.transfer_syntax(), "1.2.840.10008.1.2.1");
    }

    #[test]
    fn test_lossy_flag() {
        assert_eq!(Codec::Jpeg.lossy_flag(), "01");
        assert_eq!(Codec::Jpeg2000.lossy_flag(), "00");
        assert_eq!(Codec::Raw.lossy_flag(), "00");
    }

    #[test]
    fn test_encapsulation() {
        assert!(Codec::Jpeg.is_encapsulated());
        assert!(Codec::Jpeg2000.is_encapsulated());
        assert!(!Codec::Raw.is_encapsulated());
    }

    #[test]
    fn test_encode_raw_tile() {
        let mut tile = crate::pixels::PixelBuffer::new(2, 2);
        tile.fill_from_rgb(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        let bytes = Codec::Raw.encode(&tile, 80).unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }
}
