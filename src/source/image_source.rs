//! Plain 2-D raster as a single-level pyramid source.
//!
//! The whole image loads up front. Physical calibration comes from a
//! caller-supplied height in millimetres; width follows from the aspect
//! ratio.

use std::path::Path;

use crate::error::SourceError;
use crate::pixels::PixelBuffer;

use super::PyramidSource;

pub struct ImageSlideSource {
    image: PixelBuffer,
    physical_mm: Option<(f64, f64)>,
}

impl ImageSlideSource {
    /// Load a raster image (PNG, JPEG, BMP).
    pub fn open<P: AsRef<Path>>(path: P, height_mm: Option<f64>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .map_err(|e| SourceError::Open(format!("{}: {e}", path.display())))?;
        let rgb = decoded.into_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(SourceError::Open("empty image".to_string()));
        }

        let mut image = PixelBuffer::new(width, height);
        image.fill_from_rgb(rgb.as_raw());

        let physical_mm = height_mm.filter(|mm| *mm > 0.0).map(|mm| {
            let width_mm = mm * width as f64 / height as f64;
            (width_mm, mm)
        });

        Ok(Self { image, physical_mm })
    }
}

impl PyramidSource for ImageSlideSource {
    fn level_count(&self) -> usize {
        1
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        (level == 0).then_some((self.image.width(), self.image.height()))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        (level == 0).then_some(1.0)
    }

    fn best_level_for_downsample(&self, _downsample: f64) -> usize {
        0
    }

    fn read_region(
        &self,
        level: usize,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, SourceError> {
        if level != 0 {
            return Err(SourceError::Read(format!("no such level: {level}")));
        }
        let mut out = PixelBuffer::new(width, height);
        if x >= self.image.width() as i64 || y >= self.image.height() as i64 {
            return Ok(out);
        }
        let sx = x.max(0) as u32;
        let sy = y.max(0) as u32;
        let dx = (sx as i64 - x) as u32;
        let dy = (sy as i64 - y) as u32;
        out.copy_rect(&self.image, sx, sy, dx, dy, width, height);
        Ok(out)
    }

    fn physical_size_mm(&self) -> Option<(f64, f64)> {
        self.physical_mm
    }

    fn photometric(&self) -> &str {
        "RGB"
    }
}

// =============================================================================
// Tests
// =============================================================================
