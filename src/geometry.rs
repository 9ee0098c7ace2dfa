//! Downsampling geometry.
//!
//! Given the tile size requested for the output and the dimensions of the
//! source level pixels are read from, compute the dimensions of the emitted
//! level and of the source rectangle each tile consumes.

/// Result of [`dimension_downsampling`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownsampledGeometry {
    /// Width of the emitted level in pixels.
    pub level_width: i64,
    /// Height of the emitted level in pixels.
    pub level_height: i64,
    /// Width of the source rectangle consumed per tile, clamped to the level.
    pub frame_width: i64,
    /// Height of the source rectangle consumed per tile, clamped to the level.
    pub frame_height: i64,
}

/// Compute emitted-level and per-tile source dimensions.
///
/// `downsample_of_level` is the remaining factor between the chosen source
/// level and the target output level (1.0 when the source level is already at
/// target magnification). When `retile` is false the source level is emitted
/// as-is.
pub fn dimension_downsampling(
    frame_width: i64,
    frame_height: i64,
    source_level_width: i64,
    source_level_height: i64,
    retile: bool,
    downsample_of_level: f64,
) -> DownsampledGeometry {
    let mut level_width = source_level_width;
    let mut level_height = source_level_height;
    if retile {
        level_width = (source_level_width as f64 / downsample_of_level) as i64;
        level_height = (source_level_height as f64 / downsample_of_level) as i64;
    }
    DownsampledGeometry {
        level_width,
        level_height,
        frame_width: frame_width.min(level_width),
        frame_height: frame_height.min(level_height),
    }
}

/// Tiles per row for an image width and tile width.
#[inline]
pub fn tiles_per_row(image_width: i64, tile_width: i64) -> i64 {
    1 + (image_width - 1) / tile_width
}

/// Tiles per column for an image height and tile height.
#[inline]
pub fn tiles_per_column(image_height: i64, tile_height: i64) -> i64 {
    1 + (image_height - 1) / tile_height
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_retile_passes_level_through() {
        let g = dimension_downsampling(500, 500, 2220, 2967, false, 4.0);
        assert_eq!(g.level_width, 2220);
        assert_eq!(g.level_height, 2967);
        assert_eq!(g.frame_width, 500);
        assert_eq!(g.frame_height, 500);
    }

    #[test]
    fn test_retile_scales_level() {
        let g = dimension_downsampling(500, 500, 2000, 1000, true, 2.0);
        assert_eq!(g.level_width, 1000);
        assert_eq!(g.level_height, 500);
    }

    #[test]
    fn test_frame_clamped_to_small_level() {
        let g = dimension_downsampling(500, 500, 300, 200, false, 1.0);
        assert_eq!(g.frame_width, 300);
        assert_eq!(g.frame_height, 200);
    }

    #[test]
    fn test_retile_clamps_after_scaling() {
        let g = dimension_downsampling(256, 256, 1000, 1000, true, 8.0);
        assert_eq!(g.level_width, 125);
        assert_eq!(g.frame_width, 125);
    }

    #[test]
    fn test_tile_grid_counts() {
        assert_eq!(tiles_per_row(2220, 500), 5);
        assert_eq!(tiles_per_column(2967, 500), 6);
        assert_eq!(tiles_per_row(500, 500), 1);
        assert_eq!(tiles_per_row(501, 500), 2);
    }
}
