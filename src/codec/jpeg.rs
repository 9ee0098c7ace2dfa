//! JPEG baseline encode/decode.
//!
//! Encoding always produces baseline (process 1) streams at the configured
//! quality. Decoding accepts both RGB and YCbCr streams; slide tiles declare
//! their color space through the photometric interpretation of the file they
//! come from.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageReader, RgbImage};

use crate::error::CodecError;
use crate::pixels::PixelBuffer;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Color space a JPEG scan was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    Rgb,
    Ycbcr,
}

impl JpegColorSpace {
    /// Map a DICOM photometric interpretation to the decode color space.
    pub fn from_photometric(photometric: &str) -> Self {
        if photometric.trim() == "RGB" {
            JpegColorSpace::Rgb
        } else {
            JpegColorSpace::Ycbcr
        }
    }
}

/// Encode interleaved RGB bytes as a baseline JPEG at `quality` (1-100).
pub fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Bytes, CodecError> {
    let quality = quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY);
    let img = RgbImage::from_raw(width, height, rgb.to_vec())
        .ok_or_else(|| CodecError::Encode("RGB buffer does not match dimensions".to_string()))?;

    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
    encoder
        .encode_image(&img)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(Bytes::from(output))
}

/// Decode a JPEG stream into an RGBA tile of exactly `width` × `height`.
///
/// The decoder library converts YCbCr scans to RGB internally; the
/// `color_space` argument exists so callers state what the stream claims,
/// and so mismatched dimensions are reported against the right source.
pub fn decode_jpeg(
    data: &[u8],
    width: u32,
    height: u32,
    _color_space: JpegColorSpace,
) -> Result<PixelBuffer, CodecError> {
    let reader = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Jpeg);
    let img = reader
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    let rgb = img.into_rgb8();
    if rgb.width() != width || rgb.height() != height {
        return Err(CodecError::SizeMismatch {
            expected: width as usize * height as usize * 3,
            actual: rgb.width() as usize * rgb.height() as usize * 3,
        });
    }
    let mut tile = PixelBuffer::new(width, height);
    tile.fill_from_rgb(rgb.as_raw());
    Ok(tile)
}

/// Read the dimensions of a JPEG stream without decoding pixel data.
///
/// Answers "can this be decoded to the expected size" cheaply.
pub fn jpeg_dimensions(data: &[u8]) -> Result<(u32, u32), CodecError> {
    let reader = ImageReader::with_format(Cursor::new(data), image::ImageFormat::Jpeg);
    reader
        .into_dimensions()
        .map_err(|e| CodecError::Decode(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
