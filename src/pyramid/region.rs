//! Rectangular reads over a finished level's frames.
//!
//! Presents the ordered instance builders of a completed level as one flat,
//! frame-indexed array and serves arbitrary rectangular reads across frame
//! and file boundaries. Reads decode each frame's raw cache on demand and
//! release the planned read lease; [`RegionReader::plan_reads`] is the
//! scheduler's up-front lease registration, so a frame's cache drops as
//! soon as its last consumer has read.

use std::sync::Arc;

use crate::error::{ConvertError, SourceError};
use crate::frame::Frame;
use crate::geometry::{tiles_per_column, tiles_per_row};
use crate::pixels::PixelBuffer;

use super::builder::InstanceBuilder;

pub struct RegionReader {
    /// Level frames in tile-grid row-major order.
    frames: Vec<Arc<Frame>>,
    frame_width: i64,
    frame_height: i64,
    image_width: i64,
    image_height: i64,
    frames_per_row: i64,
    frames_per_column: i64,
}

impl RegionReader {
    /// Build a reader over the instances of one completed level.
    ///
    /// All instances must agree on frame and image dimensions, and their
    /// frames must have kept raw pixel caches.
    pub fn new(instances: &[Arc<InstanceBuilder>]) -> Result<Self, ConvertError> {
        let first = instances.first().ok_or_else(|| {
            ConvertError::Source(SourceError::Read(
                "no instances to read from".to_string(),
            ))
        })?;
        let frame_width = first.tile_width();
        let frame_height = first.tile_height();
        let image_width = first.image_width();
        let image_height = first.image_height();

        let mut frames = Vec::new();
        for instance in instances {
            if instance.tile_width() != frame_width
                || instance.tile_height() != frame_height
                || instance.image_width() != image_width
                || instance.image_height() != image_height
            {
                return Err(ConvertError::Source(SourceError::Read(
                    "instances disagree on frame or image dimensions".to_string(),
                )));
            }
            frames.extend(instance.frames().iter().cloned());
        }
        if !frames.first().is_some_and(|f| f.has_raw_cache()) {
            return Err(ConvertError::Source(SourceError::Read(
                "source level frames were produced without raw pixel caches".to_string(),
            )));
        }

        Ok(Self {
            frames,
            frame_width,
            frame_height,
            image_width,
            image_height,
            frames_per_row: tiles_per_row(image_width, frame_width),
            frames_per_column: tiles_per_column(image_height, frame_height),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Dimensions of the level this reader serves.
    pub fn image_dimensions(&self) -> (i64, i64) {
        (self.image_width, self.image_height)
    }

    /// Grid range of frames a rectangle touches, clamped to the grid.
    fn covered_frames(&self, x: i64, y: i64, width: i64, height: i64) -> (i64, i64, i64, i64) {
        let first_fx = (x.max(0) / self.frame_width).min(self.frames_per_row - 1);
        let first_fy = (y.max(0) / self.frame_height).min(self.frames_per_column - 1);
        let last_fx = ((x + width - 1).max(0) / self.frame_width).min(self.frames_per_row - 1);
        let last_fy = ((y + height - 1).max(0) / self.frame_height).min(self.frames_per_column - 1);
        (first_fx, first_fy, last_fx, last_fy)
    }

    /// Register one future read lease on every frame a later
    /// `read_region` with the same rectangle will touch.
    pub fn plan_reads(&self, x: i64, y: i64, width: i64, height: i64) {
        if x >= self.image_width || y >= self.image_height || width <= 0 || height <= 0 {
            return;
        }
        let (first_fx, first_fy, last_fx, last_fy) = self.covered_frames(x, y, width, height);
        for fy in first_fy..=last_fy {
            for fx in first_fx..=last_fx {
                let index = (fy * self.frames_per_row + fx) as usize;
                if let Some(frame) = self.frames.get(index) {
                    frame.inc_read_counter();
                }
            }
        }
    }

    /// Read a rectangle spanning any number of frames.
    ///
    /// Pixels outside the image bounds (or covered by a frame index beyond
    /// the array) come back as all-zero bytes.
    pub fn read_region(
        &self,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, ConvertError> {
        let mut out = PixelBuffer::new(width, height);
        if x >= self.image_width || y >= self.image_height {
            return Ok(out);
        }
        let (first_fx, first_fy, last_fx, last_fy) =
            self.covered_frames(x, y, width as i64, height as i64);

        for fy in first_fy..=last_fy {
            for fx in first_fx..=last_fx {
                let index = (fy * self.frames_per_row + fx) as usize;
                let Some(frame) = self.frames.get(index) else {
                    continue;
                };
                let pixels = frame.raw_pixels().map_err(|e| {
                    ConvertError::Source(SourceError::Read(format!(
                        "frame {index} of source level: {e}"
                    )))
                })?;

                let frame_x0 = fx * self.frame_width;
                let frame_y0 = fy * self.frame_height;
                let ix0 = x.max(frame_x0);
                let iy0 = y.max(frame_y0);
                let ix1 = (x + width as i64)
                    .min(frame_x0 + self.frame_width)
                    .min(self.image_width);
                let iy1 = (y + height as i64)
                    .min(frame_y0 + self.frame_height)
                    .min(self.image_height);
                if ix0 >= ix1 || iy0 >= iy1 {
                    continue;
                }
                out.copy_rect(
                    &pixels,
                    (ix0 - frame_x0) as u32,
                    (iy0 - frame_y0) as u32,
                    (ix0 - x) as u32,
                    (iy0 - y) as u32,
                    (ix1 - ix0) as u32,
                    (iy1 - iy0) as u32,
                );
            }
        }
        Ok(out)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::frame::{PixelSupply, Resampler};
    use crate::pyramid::builder::InstanceParams;
    use crate::source::ImageSlideSource;

    /// Produce a finished 2x2-frame level (4x4 image, 2px frames) whose
    /// frame pixel values are 1, 2, 3, 4 in row-major order, wrapped in a
    /// single instance builder.
    fn finished_level(dir: &tempfile::TempDir) -> Vec<Arc<InstanceBuilder>> {
        let path = dir.path().join("level.png");
        let img = image::RgbImage::from_fn(4, 4, |x, y| {
            let v = 1 + (y / 2) * 2 + x / 2;
            image::Rgb([v as u8, v as u8, v as u8])
        });
        img.save(&path).unwrap();
        let source = ImageSlideSource::open(&path, None).unwrap();
        let supply = PixelSupply::Source {
            source: &source,
            level: 0,
        };

        let mut frames = Vec::new();
        for fy in 0..2i64 {
            for fx in 0..2i64 {
                let frame = Arc::new(Frame::new(
                    fx * 2,
                    fy * 2,
                    2,
                    2,
                    2,
                    2,
                    4,
                    4,
                    Resampler::Nearest,
                    Codec::Raw,
                    80,
                    true,
                    "RGB",
                ));
                frame.slice(&supply).unwrap();
                frames.push(frame);
            }
        }

        let params = InstanceParams {
            level: 0,
            batch_ordinal: 0,
            frames_before: 0,
            total_frames_in_level: 4,
            start_row: 1,
            start_column: 1,
            image_width: 4,
            image_height: 4,
            tile_width: 2,
            tile_height: 2,
            tiled: true,
            codec: Codec::Raw,
            study_uid: "1.2".to_string(),
            series_uid: "1.3".to_string(),
            image_name: String::new(),
            physical_width_mm: 0.0,
            physical_height_mm: 0.0,
            out_folder: dir.path().to_path_buf(),
        };
        vec![Arc::new(InstanceBuilder::new(
            frames,
            params,
            Arc::new(crate::dicom::DataSet::new()),
        ))]
    }

    #[test]
    fn test_sub_rectangle_across_frames() {
        let dir = tempfile::tempdir().unwrap();
        let instances = finished_level(&dir);
        let reader = RegionReader::new(&instances).unwrap();
        assert_eq!(reader.frame_count(), 4);
        assert_eq!(reader.image_dimensions(), (4, 4));

        reader.plan_reads(1, 1, 3, 3);
        let out = reader.read_region(1, 1, 3, 3).unwrap();
        let values: Vec<u8> = (0..3)
            .flat_map(|y| (0..3).map(move |x| (x, y)))
            .map(|(x, y)| out.get(x, y)[0])
            .collect();
        assert_eq!(values, vec![1, 2, 2, 3, 4, 4, 3, 4, 4]);
    }

    #[test]
    fn test_identical_reads_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let instances = finished_level(&dir);
        let reader = RegionReader::new(&instances).unwrap();

        reader.plan_reads(0, 0, 3, 3);
        reader.plan_reads(0, 0, 3, 3);
        let first = reader.read_region(0, 0, 3, 3).unwrap();
        let second = reader.read_region(0, 0, 3, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_out_of_image_pixels_are_zero() {
        let dir = tempfile::tempdir().unwrap();
        let instances = finished_level(&dir);
        let reader = RegionReader::new(&instances).unwrap();

        reader.plan_reads(3, 3, 4, 4);
        let out = reader.read_region(3, 3, 4, 4).unwrap();
        assert_eq!(out.get(0, 0)[0], 4);
        assert_eq!(out.get(2, 2), [0, 0, 0, 0]);

        // A read entirely past the image succeeds with all zeros.
        let out = reader.read_region(10, 10, 2, 2).unwrap();
        assert!(out.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_caches_released_after_planned_reads() {
        let dir = tempfile::tempdir().unwrap();
        let instances = finished_level(&dir);
        let reader = RegionReader::new(&instances).unwrap();

        // One planned lease per frame.
        reader.plan_reads(0, 0, 4, 4);
        reader.read_region(0, 0, 4, 4).unwrap();
        for instance in &instances {
            for frame in instance.frames() {
                assert!(!frame.has_raw_cache());
            }
        }
        // Further unplanned reads fail: the caches are gone.
        assert!(reader.read_region(0, 0, 4, 4).is_err());
    }

    #[test]
    fn test_empty_instance_list_rejected() {
        assert!(RegionReader::new(&[]).is_err());
    }
}
