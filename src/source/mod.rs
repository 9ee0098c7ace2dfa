//! Pyramid sources: format-agnostic access to input pixels.
//!
//! Three kinds of input can seed a conversion:
//! - a multi-resolution SVS/TIFF slide ([`TiffSlideSource`]),
//! - an existing tiled WSI DICOM file ([`DicomSlideSource`]),
//! - a plain 2-D raster treated as a single level ([`ImageSlideSource`]).
//!
//! All expose the same capability set through [`PyramidSource`].

mod dicom_source;
mod image_source;
mod tiff_source;

pub use dicom_source::DicomSlideSource;
pub use image_source::ImageSlideSource;
pub use tiff_source::TiffSlideSource;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::SourceError;
use crate::pixels::PixelBuffer;

/// Format-agnostic read access to an input pyramid.
///
/// Region coordinates are in the addressed level's own pixel space. Reads
/// that extend past the image bounds succeed, with out-of-bounds pixels
/// written as all-zero bytes.
pub trait PyramidSource: Send + Sync {
    /// Number of native resolution levels.
    fn level_count(&self) -> usize;

    /// Dimensions of a level in pixels.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    /// Downsample of a level relative to level 0 (level 0 = 1.0).
    fn level_downsample(&self, level: usize) -> Option<f64>;

    /// The coarsest level whose downsample does not exceed the factor.
    fn best_level_for_downsample(&self, downsample: f64) -> usize;

    /// Read a rectangle of a level into an RGBA tile.
    fn read_region(
        &self,
        level: usize,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, SourceError>;

    /// Physical size of the imaged volume in millimetres, when known.
    fn physical_size_mm(&self) -> Option<(f64, f64)>;

    /// Photometric interpretation of the source pixels.
    fn photometric(&self) -> &str;
}

/// Input kinds recognized by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Tiff,
    Dicom,
    PlainImage,
}

/// Detect the input format from magic bytes.
pub fn detect_format(path: &Path) -> Result<SourceFormat, SourceError> {
    let mut file = File::open(path)
        .map_err(|e| SourceError::Open(format!("{}: {e}", path.display())))?;
    let mut head = [0u8; 132];
    let n = file.read(&mut head).map_err(SourceError::from)?;

    if n >= 132 && &head[128..132] == b"DICM" {
        return Ok(SourceFormat::Dicom);
    }
    if n >= 4 {
        let le = head[0] == 0x49 && head[1] == 0x49 && head[2] == 0x2A && head[3] == 0x00;
        let be = head[0] == 0x4D && head[1] == 0x4D && head[2] == 0x00 && head[3] == 0x2A;
        let le_big = head[0] == 0x49 && head[1] == 0x49 && head[2] == 0x2B && head[3] == 0x00;
        let be_big = head[0] == 0x4D && head[1] == 0x4D && head[2] == 0x00 && head[3] == 0x2B;
        if le || be || le_big || be_big {
            return Ok(SourceFormat::Tiff);
        }
    }
    Ok(SourceFormat::PlainImage)
}

/// Open an input file as a pyramid source.
///
/// `image_height_mm` only applies to plain-image inputs, whose files carry
/// no physical calibration of their own.
pub fn open_source(
    path: &Path,
    image_height_mm: Option<f64>,
) -> Result<Box<dyn PyramidSource>, SourceError> {
    match detect_format(path)? {
        SourceFormat::Tiff => Ok(Box::new(TiffSlideSource::open(path)?)),
        SourceFormat::Dicom => Ok(Box::new(DicomSlideSource::open(path)?)),
        SourceFormat::PlainImage => {
            Ok(Box::new(ImageSlideSource::open(path, image_height_mm)?))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
