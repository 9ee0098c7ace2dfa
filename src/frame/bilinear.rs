//! Area-weighted bilinear resampling.
//!
//! Samples a region slightly larger than the downsampled rectangle so that
//! source pixels straddling the output-pixel boundary contribute to edge
//! pixels. Each source pixel scatters its color into up to four destination
//! pixels, weighted by its fractional overlap; a destination pixel is the
//! weighted sum divided by the accumulated area. Cells no source pixel
//! reached come out opaque white. Transparent source pixels are skipped;
//! partially transparent ones are un-premultiplied first.

use crate::error::SourceError;
use crate::pixels::PixelBuffer;

use super::PixelSupply;

/// Accumulator cell: weighted R, G, B plus total area weight.
#[derive(Clone, Copy, Default)]
struct Cell {
    r: f64,
    g: f64,
    b: f64,
    area: f64,
}

#[inline]
fn scatter(cells: &mut [Cell], width: i64, height: i64, cx: i64, cy: i64, rgb: [f64; 3], weight: f64) {
    if cx < 0 || cy < 0 || cx >= width || cy >= height {
        return;
    }
    let cell = &mut cells[(cy * width + cx) as usize];
    cell.r += weight * rgb[0];
    cell.g += weight * rgb[1];
    cell.b += weight * rgb[2];
    cell.area += weight;
}

/// Resample a tile by area-weighted bilinear projection.
///
/// `(location_x, location_y, read_width, read_height)` is the rectangle in
/// the supply level that maps onto the output tile; `target_*` are the full
/// output level dimensions the supply level projects into.
#[allow(clippy::too_many_arguments)]
pub fn resample_bilinear(
    supply: &PixelSupply<'_>,
    location_x: i64,
    location_y: i64,
    read_width: i64,
    read_height: i64,
    frame_width: u32,
    frame_height: u32,
    target_level_width: i64,
    target_level_height: i64,
) -> Result<PixelBuffer, SourceError> {
    let (level_width, level_height) = supply.dimensions();
    if level_width == 0 || level_height == 0 {
        return Err(SourceError::Read("empty pixel supply".to_string()));
    }

    // Overestimate of the per-axis downsampling, used to widen the sampled
    // rectangle so boundary-straddling pixels are included.
    let margin_x =
        ((level_width as f64 / target_level_width.max(1) as f64).ceil() as i64 - 1).max(0);
    let margin_y =
        ((level_height as f64 / target_level_height.max(1) as f64).ceil() as i64 - 1).max(0);

    let mut sample_x = location_x - margin_x;
    let mut sample_y = location_y - margin_y;
    let mut sample_w = read_width + 2 * margin_x;
    let mut sample_h = read_height + 2 * margin_y;
    if sample_x < 0 {
        sample_w += sample_x;
        sample_x = 0;
    }
    if sample_y < 0 {
        sample_h += sample_y;
        sample_y = 0;
    }
    sample_w = sample_w.min(level_width - sample_x);
    sample_h = sample_h.min(level_height - sample_y);
    if sample_w <= 0 || sample_h <= 0 {
        // Entire rectangle outside the supply: fill white like any
        // uncovered cell.
        let mut out = PixelBuffer::new(frame_width, frame_height);
        out.data_mut().fill(0xFF);
        return Ok(out);
    }

    let region = supply.read_region(sample_x, sample_y, sample_w as u32, sample_h as u32)?;

    let fw = frame_width as i64;
    let fh = frame_height as i64;
    let mut cells = vec![Cell::default(); (fw * fh) as usize];

    let no_downsampling = target_level_width == level_width;

    // Position of the tile's (0,0) in output-level coordinates.
    let frame_x_start = (target_level_width * location_x / level_width) as f64;
    let frame_y_start = (target_level_height * location_y / level_height) as f64;

    // Cache the X projection: it repeats identically for every row.
    let x_projection: Vec<f64> = (0..sample_w)
        .map(|px| {
            let level_x = px + sample_x;
            (level_x * target_level_width) as f64 / level_width as f64 - frame_x_start
        })
        .collect();

    for py in 0..sample_h {
        let level_y = py + sample_y;
        let frame_y =
            (level_y * target_level_height) as f64 / level_height as f64 - frame_y_start;
        let cy = frame_y.floor() as i64;
        if cy <= -1 || cy >= level_height {
            continue;
        }
        let ny_weight = frame_y - frame_y.floor();
        let y_weight = 1.0 - ny_weight;

        for px in 0..sample_w {
            let [r, g, b, alpha] = region.get(px as u32, py as u32);
            if alpha == 0 {
                continue;
            }
            let (mut r, mut g, mut b) = (r as u32, g as u32, b as u32);
            if alpha != 255 {
                // Premultiplied-alpha inputs: recover the straight color.
                r = r * 255 / alpha as u32;
                g = g * 255 / alpha as u32;
                b = b * 255 / alpha as u32;
            }
            let rgb = [r as f64, g as f64, b as f64];

            if no_downsampling {
                let cx = px + sample_x - location_x;
                scatter(&mut cells, fw, fh, cx, cy, rgb, 1.0);
            } else {
                let frame_x = x_projection[px as usize];
                let cx = frame_x.floor() as i64;
                let nx_weight = frame_x - frame_x.floor();
                let x_weight = 1.0 - nx_weight;
                scatter(&mut cells, fw, fh, cx, cy, rgb, x_weight * y_weight);
                scatter(&mut cells, fw, fh, cx + 1, cy, rgb, nx_weight * y_weight);
                scatter(&mut cells, fw, fh, cx + 1, cy + 1, rgb, nx_weight * ny_weight);
                scatter(&mut cells, fw, fh, cx, cy + 1, rgb, x_weight * ny_weight);
            }
        }
    }

    let mut out = PixelBuffer::new(frame_width, frame_height);
    for (idx, cell) in cells.iter().enumerate() {
        let x = (idx as i64 % fw) as u32;
        let y = (idx as i64 / fw) as u32;
        if cell.area == 0.0 {
            out.put(x, y, [0xFF, 0xFF, 0xFF, 0xFF]);
        } else {
            out.put(
                x,
                y,
                [
                    (cell.r / cell.area) as u8,
                    (cell.g / cell.area) as u8,
                    (cell.b / cell.area) as u8,
                    0xFF,
                ],
            );
        }
    }
    Ok(out)
}

// =============================================================================
// Tests
// =============================================================================
