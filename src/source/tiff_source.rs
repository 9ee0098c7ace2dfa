//! SVS / pyramidal-TIFF pyramid source.
//!
//! Tiles decode on demand: abbreviated JPEG tiles are completed from the
//! IFD's JPEGTables first, Aperio JPEG 2000 tiles (compression
//! 33003/33005) decode directly. Physical calibration comes from the
//! Aperio `MPP` ImageDescription field when present.

use std::path::Path;

use crate::codec::{decode_jp2, decode_jpeg, JpegColorSpace};
use crate::error::{SourceError, TiffError};
use crate::format::tiff::{Compression, TiffPyramid, TileData};
use crate::io::{FileRangeReader, RangeReader};
use crate::pixels::PixelBuffer;

use super::PyramidSource;

pub struct TiffSlideSource {
    reader: FileRangeReader,
    pyramid: TiffPyramid,
    /// Tile placement data per pyramid level, loaded up front.
    tiles: Vec<TileData>,
    physical_mm: Option<(f64, f64)>,
}

impl TiffSlideSource {
    /// Open and index a slide file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let reader = FileRangeReader::open(path)?;
        let pyramid = TiffPyramid::parse(&reader).map_err(|e| match e {
            TiffError::StripOrganization => {
                SourceError::Open("no tiled pyramid levels in file".to_string())
            }
            other => SourceError::Tiff(other),
        })?;

        for level in &pyramid.levels {
            if !level.compression.is_supported() {
                return Err(SourceError::Open(format!(
                    "level {} uses {} compression",
                    level.level_index,
                    level.compression.name()
                )));
            }
        }

        let mut tiles = Vec::with_capacity(pyramid.level_count());
        for level in &pyramid.levels {
            tiles.push(TileData::load(&reader, level, &pyramid.header)?);
        }

        let physical_mm = pyramid.microns_per_pixel().map(|mpp| {
            let (w, h) = pyramid.dimensions();
            (w as f64 * mpp / 1000.0, h as f64 * mpp / 1000.0)
        });

        Ok(Self {
            reader,
            pyramid,
            tiles,
            physical_mm,
        })
    }

    /// Decode one native tile to RGBA.
    fn decode_tile(&self, level: usize, tile_x: u32, tile_y: u32) -> Result<PixelBuffer, SourceError> {
        let level_info = self
            .pyramid
            .level(level)
            .ok_or_else(|| SourceError::Read(format!("no such level: {level}")))?;
        let tile_data = &self.tiles[level];
        let index = level_info
            .tile_index(tile_x, tile_y)
            .ok_or_else(|| SourceError::Read(format!("tile ({tile_x},{tile_y}) out of range")))?;
        let (offset, size) = tile_data
            .tile_location(index)
            .ok_or_else(|| SourceError::Read(format!("no placement for tile {index}")))?;
        if size == 0 {
            // Blank tile: scanners write zero-length entries for empty areas.
            return Ok(PixelBuffer::new(level_info.tile_width, level_info.tile_height));
        }
        let bytes = self.reader.read_exact_at(offset, size as usize)?;

        let tile = match level_info.compression {
            Compression::Jpeg => {
                let complete = tile_data.complete_jpeg(&bytes);
                decode_jpeg(
                    &complete,
                    level_info.tile_width,
                    level_info.tile_height,
                    JpegColorSpace::Ycbcr,
                )?
            }
            Compression::Jpeg2000 => {
                decode_jp2(&bytes, level_info.tile_width, level_info.tile_height)?
            }
            other => {
                return Err(SourceError::Read(format!(
                    "unsupported tile compression {}",
                    other.name()
                )))
            }
        };
        Ok(tile)
    }
}

impl PyramidSource for TiffSlideSource {
    fn level_count(&self) -> usize {
        self.pyramid.level_count()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.pyramid.level(level).map(|l| (l.width, l.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.pyramid.level(level).map(|l| l.downsample)
    }

    fn best_level_for_downsample(&self, downsample: f64) -> usize {
        self.pyramid.best_level_for_downsample(downsample)
    }

    fn read_region(
        &self,
        level: usize,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, SourceError> {
        let info = self
            .pyramid
            .level(level)
            .ok_or_else(|| SourceError::Read(format!("no such level: {level}")))?;
        let mut out = PixelBuffer::new(width, height);

        let tw = info.tile_width as i64;
        let th = info.tile_height as i64;
        let first_tx = (x.max(0) / tw).max(0);
        let first_ty = (y.max(0) / th).max(0);
        let last_tx = ((x + width as i64 - 1).min(info.width as i64 - 1) / tw).max(first_tx);
        let last_ty = ((y + height as i64 - 1).min(info.height as i64 - 1) / th).max(first_ty);

        if x >= info.width as i64 || y >= info.height as i64 {
            return Ok(out);
        }

        for ty in first_ty..=last_ty {
            for tx in first_tx..=last_tx {
                if tx as u32 >= info.tiles_x || ty as u32 >= info.tiles_y {
                    continue;
                }
                let tile = self.decode_tile(level, tx as u32, ty as u32)?;
                // Intersection of the tile rectangle with the request.
                let tile_x0 = tx * tw;
                let tile_y0 = ty * th;
                let ix0 = x.max(tile_x0);
                let iy0 = y.max(tile_y0);
                let ix1 = (x + width as i64).min(tile_x0 + tw).min(info.width as i64);
                let iy1 = (y + height as i64).min(tile_y0 + th).min(info.height as i64);
                if ix0 >= ix1 || iy0 >= iy1 {
                    continue;
                }
                out.copy_rect(
                    &tile,
                    (ix0 - tile_x0) as u32,
                    (iy0 - tile_y0) as u32,
                    (ix0 - x) as u32,
                    (iy0 - y) as u32,
                    (ix1 - ix0) as u32,
                    (iy1 - iy0) as u32,
                );
            }
        }
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
