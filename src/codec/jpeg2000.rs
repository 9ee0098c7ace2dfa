//! JPEG 2000 encode/decode.
//!
//! Encoding is lossless single-layer: pyramid levels compressed with this
//! codec round-trip bit exactly. Decoding accepts both raw J2K codestreams
//! and JP2-boxed files, as found in existing DICOM pyramids and SVS tiles.

use bytes::Bytes;
use image::DynamicImage;
use jpeg2k::{EncodeParameters, Image};

use crate::error::CodecError;
use crate::pixels::PixelBuffer;

/// Encode interleaved RGB bytes as a lossless single-layer JPEG 2000 stream.
pub fn encode_jp2(rgb: &[u8], width: u32, height: u32) -> Result<Bytes, CodecError> {
    let img = image::RgbImage::from_raw(width, height, rgb.to_vec())
        .ok_or_else(|| CodecError::Encode("RGB buffer does not match dimensions".to_string()))?;
    let dynamic = DynamicImage::ImageRgb8(img);
    let jp2 = Image::from_dynamic_image(&dynamic).map_err(|e| CodecError::Encode(e.to_string()))?;
    // Default parameters are reversible (lossless), one quality layer.
    let encoded = jp2
        .encode(EncodeParameters::default())
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(Bytes::from(encoded))
}

/// Decode a JPEG 2000 stream into an RGBA tile of exactly `width` × `height`.
pub fn decode_jp2(data: &[u8], width: u32, height: u32) -> Result<PixelBuffer, CodecError> {
    let img = Image::from_bytes(data).map_err(|e| CodecError::Decode(e.to_string()))?;
    if img.width() != width || img.height() != height {
        return Err(CodecError::SizeMismatch {
            expected: width as usize * height as usize * 3,
            actual: img.width() as usize * img.height() as usize * 3,
        });
    }
    let components = img.components();
    if components.len() < 3 {
        return Err(CodecError::Decode(format!(
            "expected 3 color components, got {}",
            components.len()
        )));
    }

    let mut tile = PixelBuffer::new(width, height);
    let pixel_count = width as usize * height as usize;
    let data = tile.data_mut();
    for (channel, component) in components.iter().take(3).enumerate() {
        let samples = component.data();
        if samples.len() < pixel_count {
            return Err(CodecError::SizeMismatch {
                expected: pixel_count,
                actual: samples.len(),
            });
        }
        for (i, sample) in samples.iter().take(pixel_count).enumerate() {
            data[i * 4 + channel] = *sample as u8;
        }
    }
    for i in 0..pixel_count {
        data[i * 4 + 3] = 0xFF;
    }
    Ok(tile)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn block_rgb(width: u32, height: u32, value: u8) -> Vec<u8> {
        vec![value; (width * height * 3) as usize]
    }

    #[test]
    fn test_encode_produces_codestream() {
        let rgb = block_rgb(16, 16, 77);
        let out = encode_jp2(&rgb, 16, 16).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn test_lossless_round_trip() {
        // Lossless coding must reproduce samples exactly.
        let mut rgb = Vec::new();
        for i in 0..(8 * 8) {
            rgb.extend_from_slice(&[(i % 256) as u8, ((i * 3) % 256) as u8, 200]);
        }
        let out = encode_jp2(&rgb, 8, 8).unwrap();
        let tile = decode_jp2(&out, 8, 8).unwrap();
        assert_eq!(tile.to_rgb(), rgb);
    }

    #[test]
    fn test_decode_size_mismatch() {
        let rgb = block_rgb(8, 8, 10);
        let out = encode_jp2(&rgb, 8, 8).unwrap();
        assert!(matches!(
            decode_jp2(&out, 4, 4),
            Err(CodecError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_data() {
        assert!(matches!(
            decode_jp2(&[0u8; 16], 8, 8),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_encode_bad_buffer() {
        assert!(encode_jp2(&[0u8; 7], 8, 8).is_err());
    }
}
