//! Existing WSI DICOM file as a pyramid source.
//!
//! The file is parsed once for geometry and fragment placement; frame
//! payloads are fetched on demand. Because tile workers decode frames
//! concurrently, the source holds a pool of independent file handles and
//! dispenses them round-robin, so reads do not serialize on one handle's
//! seek position.

use std::path::Path;

use parking_lot::Mutex;

use crate::codec::{decode_jp2, decode_jpeg, JpegColorSpace};
use crate::dicom::{
    tags, DicomFile, TS_EXPLICIT_VR_LE, TS_IMPLICIT_VR_LE, TS_JPEG2000_LOSSLESS, TS_JPEG_BASELINE,
};
use crate::error::{DicomError, SourceError};
use crate::io::{FileRangeReader, RangeReader};
use crate::pixels::PixelBuffer;

use super::PyramidSource;

/// Number of pooled dataset readers.
const DATASET_READER_POOL: usize = 30;

/// How a frame payload is materialized into pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameEncoding {
    Jpeg,
    Jpeg2000,
    Native,
}

pub struct DicomSlideSource {
    readers: Vec<FileRangeReader>,
    next_reader: Mutex<usize>,
    file: DicomFile,
    encoding: FrameEncoding,
    width: u32,
    height: u32,
    frame_width: u32,
    frame_height: u32,
    frames_per_row: u32,
    photometric: String,
    physical_mm: Option<(f64, f64)>,
}

impl DicomSlideSource {
    /// Open an existing WSI DICOM file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let first = FileRangeReader::open(path)?;
        let file = DicomFile::parse(&first).map_err(map_open_error)?;

        let encoding = match file.transfer_syntax.as_str() {
            TS_JPEG_BASELINE => FrameEncoding::Jpeg,
            TS_JPEG2000_LOSSLESS => FrameEncoding::Jpeg2000,
            TS_EXPLICIT_VR_LE | TS_IMPLICIT_VR_LE => FrameEncoding::Native,
            other => {
                return Err(SourceError::Open(format!(
                    "unsupported transfer syntax {other}"
                )))
            }
        };

        let frame_width = file
            .required_u32(tags::COLUMNS, "Columns")
            .map_err(map_open_error)?;
        let frame_height = file
            .required_u32(tags::ROWS, "Rows")
            .map_err(map_open_error)?;
        let width = file
            .required_u32(tags::TOTAL_PIXEL_MATRIX_COLUMNS, "TotalPixelMatrixColumns")
            .map_err(map_open_error)?;
        let height = file
            .required_u32(tags::TOTAL_PIXEL_MATRIX_ROWS, "TotalPixelMatrixRows")
            .map_err(map_open_error)?;
        if frame_width == 0 || frame_height == 0 || width == 0 || height == 0 {
            return Err(SourceError::Open("degenerate image geometry".to_string()));
        }

        let frames = file.number_of_frames();
        let frames_per_row = (width + frame_width - 1) / frame_width;
        let frames_per_column = (height + frame_height - 1) / frame_height;
        if frames < frames_per_row * frames_per_column {
            return Err(SourceError::Open(format!(
                "file holds {frames} frames but the tile grid needs {}",
                frames_per_row * frames_per_column
            )));
        }
        match encoding {
            FrameEncoding::Native => {
                if file.pixel_data.flat.is_none() {
                    return Err(SourceError::Open("missing native pixel data".to_string()));
                }
            }
            _ => {
                if (file.pixel_data.fragments.len() as u32) < frames {
                    return Err(SourceError::Open(format!(
                        "file holds {} pixel fragments for {frames} frames",
                        file.pixel_data.fragments.len()
                    )));
                }
            }
        }

        let photometric = file
            .dataset
            .str_value(tags::PHOTOMETRIC_INTERPRETATION)
            .unwrap_or("YBR_FULL_422")
            .to_string();

        let physical_mm = match (
            file.dataset.float_value(tags::IMAGED_VOLUME_WIDTH),
            file.dataset.float_value(tags::IMAGED_VOLUME_HEIGHT),
        ) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some((w, h)),
            _ => None,
        };

        let mut readers = Vec::with_capacity(DATASET_READER_POOL);
        readers.push(first);
        for _ in 1..DATASET_READER_POOL {
            readers.push(FileRangeReader::open(path)?);
        }

        Ok(Self {
            readers,
            next_reader: Mutex::new(0),
            file,
            encoding,
            width,
            height,
            frame_width,
            frame_height,
            frames_per_row,
            photometric,
            physical_mm,
        })
    }

    /// Round-robin dispense of a pooled reader index.
    fn next_reader_index(&self) -> usize {
        let mut next = self.next_reader.lock();
        let index = *next;
        *next = (index + 1) % self.readers.len();
        index
    }

    /// Decode one frame to RGBA.
    fn read_frame(&self, frame_index: u32) -> Result<PixelBuffer, SourceError> {
        let reader = &self.readers[self.next_reader_index()];
        match self.encoding {
            FrameEncoding::Native => {
                let (offset, total) = self
                    .file
                    .pixel_data
                    .flat
                    .ok_or_else(|| SourceError::Read("missing native pixel data".to_string()))?;
                let frame_size =
                    self.frame_width as u64 * self.frame_height as u64 * 3;
                let frame_offset = offset + frame_index as u64 * frame_size;
                if frame_offset + frame_size > offset + total {
                    return Err(SourceError::Read(format!(
                        "frame {frame_index} extends past pixel data"
                    )));
                }
                let rgb = reader.read_exact_at(frame_offset, frame_size as usize)?;
                let mut tile = PixelBuffer::new(self.frame_width, self.frame_height);
                tile.fill_from_rgb(&rgb);
                Ok(tile)
            }
            FrameEncoding::Jpeg => {
                let (offset, size) = self.file.pixel_data.fragments[frame_index as usize];
                let bytes = reader.read_exact_at(offset, size as usize)?;
                Ok(decode_jpeg(
                    &bytes,
                    self.frame_width,
                    self.frame_height,
                    JpegColorSpace::from_photometric(&self.photometric),
                )?)
            }
            FrameEncoding::Jpeg2000 => {
                let (offset, size) = self.file.pixel_data.fragments[frame_index as usize];
                let bytes = reader.read_exact_at(offset, size as usize)?;
                Ok(decode_jp2(&bytes, self.frame_width, self.frame_height)?)
            }
        }
    }
}

fn map_open_error(err: DicomError) -> SourceError {
    SourceError::Open(format!("invalid source: {err}"))
}

impl PyramidSource for DicomSlideSource {
    fn level_count(&self) -> usize {
        1
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        (level == 0).then_some((self.width, self.height))
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
        if x >= self.width as i64 || y >= self.height as i64 {
            return Ok(out);
        }

        let fw = self.frame_width as i64;
        let fh = self.frame_height as i64;
        let first_fx = (x.max(0) / fw).max(0);
        let first_fy = (y.max(0) / fh).max(0);
        let last_fx = (x + width as i64 - 1).min(self.width as i64 - 1) / fw;
        let last_fy = (y + height as i64 - 1).min(self.height as i64 - 1) / fh;

        for fy in first_fy..=last_fy {
            for fx in first_fx..=last_fx {
                let frame_index = fy as u32 * self.frames_per_row + fx as u32;
                let frame = self.read_frame(frame_index)?;
                let frame_x0 = fx * fw;
                let frame_y0 = fy * fh;
                let ix0 = x.max(frame_x0);
                let iy0 = y.max(frame_y0);
                let ix1 = (x + width as i64)
                    .min(frame_x0 + fw)
                    .min(self.width as i64);
                let iy1 = (y + height as i64)
                    .min(frame_y0 + fh)
                    .min(self.height as i64);
                if ix0 >= ix1 || iy0 >= iy1 {
                    continue;
                }
                out.copy_rect(
                    &frame,
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

    fn physical_size_mm(&self) -> Option<(f64, f64)> {
        self.physical_mm
    }

    fn photometric(&self) -> &str {
        &self.photometric
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_jpeg;
    use crate::dicom::{serialize_file, FileMeta};
    use crate::dicom::{DataSet, Vr, SOP_CLASS_WSI};
    use bytes::Bytes;

    /// Write a 2x2-frame WSI DICOM fixture (32px frames, 64x64 image).
    fn build_wsi_dicom(transfer_syntax: &str) -> Vec<u8> {
        let mut ds = DataSet::new();
        ds.put_str(tags::SOP_CLASS_UID, Vr::Ui, SOP_CLASS_WSI);
        ds.put_str(tags::MODALITY, Vr::Cs, "SM");
        ds.put_u16(tags::ROWS, 32);
        ds.put_u16(tags::COLUMNS, 32);
        ds.put_u16(tags::SAMPLES_PER_PIXEL, 3);
        ds.put_str(tags::PHOTOMETRIC_INTERPRETATION, Vr::Cs, "RGB");
        ds.put_str(tags::NUMBER_OF_FRAMES, Vr::Is, "4");
        ds.put_u32(tags::TOTAL_PIXEL_MATRIX_COLUMNS, 64);
        ds.put_u32(tags::TOTAL_PIXEL_MATRIX_ROWS, 64);
        ds.put_f32(tags::IMAGED_VOLUME_WIDTH, 16.0);
        ds.put_f32(tags::IMAGED_VOLUME_HEIGHT, 16.0);

        let frame_values = [40u8, 90, 140, 190];
        if transfer_syntax == TS_JPEG_BASELINE {
            let fragments = frame_values
                .iter()
                .map(|&v| {
                    let rgb = vec![v; 32 * 32 * 3];
                    encode_jpeg(&rgb, 32, 32, 95).unwrap()
                })
                .collect();
            ds.put_fragments(tags::PIXEL_DATA, fragments);
        } else {
            let mut flat = Vec::new();
            for v in frame_values {
                flat.extend(std::iter::repeat(v).take(32 * 32 * 3));
            }
            ds.put_bytes(tags::PIXEL_DATA, Vr::Ob, Bytes::from(flat));
        }

        let meta = FileMeta {
            sop_class_uid: SOP_CLASS_WSI.to_string(),
            sop_instance_uid: "2.25.77".to_string(),
            transfer_syntax: transfer_syntax.to_string(),
        };
        serialize_file(&meta, &ds).unwrap()
    }

    fn open_fixture(transfer_syntax: &str) -> (tempfile::TempDir, DicomSlideSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pyramid.dcm");
        std::fs::write(&path, build_wsi_dicom(transfer_syntax)).unwrap();
        let source = DicomSlideSource::open(&path).unwrap();
        (dir, source)
    }

    #[test]
    fn test_open_native() {
        let (_dir, source) = open_fixture(TS_EXPLICIT_VR_LE);
        assert_eq!(source.level_count(), 1);
        assert_eq!(source.level_dimensions(0), Some((64, 64)));
        assert_eq!(source.photometric(), "RGB");
        assert_eq!(source.physical_size_mm(), Some((16.0, 16.0)));
    }

    #[test]
    fn test_read_region_native_spans_frames() {
        let (_dir, source) = open_fixture(TS_EXPLICIT_VR_LE);
        let region = source.read_region(0, 16, 16, 32, 32).unwrap();
        assert_eq!(region.get(0, 0)[0], 40);
        assert_eq!(region.get(31, 0)[0], 90);
        assert_eq!(region.get(0, 31)[0], 140);
        assert_eq!(region.get(31, 31)[0], 190);
    }

    #[test]
    fn test_read_region_jpeg_frames() {
        let (_dir, source) = open_fixture(TS_JPEG_BASELINE);
        let region = source.read_region(0, 0, 0, 64, 64).unwrap();
        assert!((region.get(5, 5)[0] as i32 - 40).abs() < 8);
        assert!((region.get(40, 40)[0] as i32 - 190).abs() < 8);
    }

    #[test]
    fn test_read_region_pads_outside() {
        let (_dir, source) = open_fixture(TS_EXPLICIT_VR_LE);
        let region = source.read_region(0, 48, 48, 32, 32).unwrap();
        assert_eq!(region.get(0, 0)[0], 190);
        assert_eq!(region.get(20, 20), [0, 0, 0, 0]);
    }

    #[test]
    fn test_reader_pool_round_robin() {
        let (_dir, source) = open_fixture(TS_EXPLICIT_VR_LE);
        assert_eq!(source.readers.len(), DATASET_READER_POOL);
        let first = source.next_reader_index();
        let second = source.next_reader_index();
        assert_eq!((first + 1) % DATASET_READER_POOL, second);
    }

    #[test]
    fn test_open_rejects_non_dicom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.dcm");
        std::fs::write(&path, vec![0u8; 400]).unwrap();
        assert!(matches!(
            DicomSlideSource::open(&path),
            Err(SourceError::Open(_))
        ));
    }
}
