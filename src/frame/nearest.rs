//! Nearest-neighbor resampling.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::pixels::PixelBuffer;

/// Resize a fetched region to the output tile size with nearest-neighbor
/// sampling. Same-size input is passed through untouched.
pub fn resample_nearest(region: &PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    if region.width() == width && region.height() == height {
        return region.clone();
    }
    let img = RgbaImage::from_raw(region.width(), region.height(), region.data().to_vec())
        .expect("buffer length matches dimensions");
    let resized = imageops::resize(&img, width, height, FilterType::Nearest);
    PixelBuffer::from_vec(width, height, resized.into_raw())
        .expect("resized buffer matches dimensions")
}
