//! Test utilities for integration tests.
//!
//! Helpers build synthetic slide fixtures on disk and pre-configured
//! conversions over them.

use std::path::{Path, PathBuf};

use wsi_dicomizer::dicom::{tags, DataSet, DicomFile};
use wsi_dicomizer::io::FileRangeReader;
use wsi_dicomizer::Config;

/// Write a PNG whose four quadrants carry distinct gray values.
///
/// Quadrant values (row-major): 10, 20, 30, 40.
pub fn quadrant_png(dir: &Path, size: u32) -> PathBuf {
    let path = dir.join("quadrants.png");
    let half = size / 2;
    let img = image::RgbImage::from_fn(size, size, |x, y| {
        let v = match (x < half, y < half) {
            (true, true) => 10,
            (false, true) => 20,
            (true, false) => 30,
            (false, false) => 40,
        };
        image::Rgb([v, v, v])
    });
    img.save(&path).unwrap();
    path
}

/// Write a horizontally striped PNG (stripe height = `stripe`).
pub fn striped_png(dir: &Path, width: u32, height: u32, stripe: u32) -> PathBuf {
    let path = dir.join("stripes.png");
    let img = image::RgbImage::from_fn(width, height, |_, y| {
        let v = 30 + ((y / stripe) * 50 % 200) as u8;
        image::Rgb([v, v, v])
    });
    img.save(&path).unwrap();
    path
}

/// Config over a fresh output directory inside `dir`.
pub fn config_for(dir: &Path, input: PathBuf, tile: i64) -> Config {
    let out = dir.join("out");
    std::fs::create_dir_all(&out).unwrap();
    let mut config = Config::with_defaults(input, out);
    config.tile_width = tile;
    config.tile_height = tile;
    config.threads = 2;
    config
}

/// Parse an emitted instance file.
pub fn read_instance(path: &Path) -> DicomFile {
    let reader = FileRangeReader::open(path).unwrap();
    DicomFile::parse(&reader).unwrap()
}

/// Decode the native (raw codec) pixel data of an instance into one flat
/// RGB byte vector, frames concatenated.
pub fn raw_frames(path: &Path) -> Vec<u8> {
    let reader = FileRangeReader::open(path).unwrap();
    let parsed = DicomFile::parse(&reader).unwrap();
    let (offset, len) = parsed.pixel_data.flat.expect("expected native pixel data");
    use wsi_dicomizer::io::RangeReader;
    reader.read_exact_at(offset, len as usize).unwrap().to_vec()
}

/// Number of frames an instance declares.
pub fn frame_count(dataset: &DataSet) -> i64 {
    dataset.int_value(tags::NUMBER_OF_FRAMES).unwrap_or(0)
}
