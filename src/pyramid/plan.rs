//! Level planning.
//!
//! Before any tile work starts, the planner fixes the complete list of
//! output levels: each level's downsample, dimensions, tile grid, the
//! pixel supply it reads from (a source base level or the previous output
//! level), and whether its frames must keep raw pixels for the next level.

use tracing::debug;

use crate::config::Config;
use crate::geometry::dimension_downsampling;
use crate::source::PyramidSource;

/// Immutable description of one planned output level.
#[derive(Debug, Clone)]
pub struct LevelPlan {
    /// Absolute output level index (drives InstanceNumber).
    pub level: u32,

    /// Downsample relative to level 0.
    pub downsample: f64,

    /// Best base level in the pyramid source.
    pub source_level: usize,

    /// The source's (possibly floor-corrected) downsample at that level.
    pub source_downsample: f64,

    /// Remaining factor between the pixel supply and this level.
    pub downsample_of_level: f64,

    /// Emitted level dimensions (after any crop).
    pub width: i64,
    pub height: i64,

    /// Emitted tile dimensions.
    pub tile_width: i64,
    pub tile_height: i64,

    /// Supply pixels consumed per tile.
    pub read_width: i64,
    pub read_height: i64,

    /// Read from the previous output level instead of the source.
    pub read_from_previous: bool,

    /// Frames must keep raw pixels for the next level's region reader.
    pub store_raw: bool,
}

impl LevelPlan {
    pub fn tiles_per_row(&self) -> i64 {
        crate::geometry::tiles_per_row(self.width, self.tile_width)
    }

    pub fn tiles_per_column(&self) -> i64 {
        crate::geometry::tiles_per_column(self.height, self.tile_height)
    }

    pub fn tile_count(&self) -> i64 {
        self.tiles_per_row() * self.tiles_per_column()
    }

    /// Whether the whole level fits in a single tile.
    pub fn single_frame(&self) -> bool {
        self.width <= self.tile_width && self.height <= self.tile_height
    }
}

/// Plan the output levels for a conversion.
///
/// Levels outside the configured start/stop range are omitted entirely;
/// planning stops early at the first single-tile level when requested.
pub fn plan_levels(source: &dyn PyramidSource, config: &Config) -> Vec<LevelPlan> {
    let retile = config.retile();
    let level_count = if retile {
        config.levels as usize
    } else {
        source.level_count()
    };

    let mut plans: Vec<LevelPlan> = Vec::new();
    for level in 0..level_count {
        if level < config.start_on as usize {
            continue;
        }
        if config.stop_on >= config.start_on && level > config.stop_on as usize {
            break;
        }

        let (downsample, source_level) = if retile {
            let downsample = config.downsample_for_level(level);
            (downsample, source.best_level_for_downsample(downsample))
        } else {
            (source.level_downsample(level).unwrap_or(1.0), level)
        };

        let mut source_downsample = source.level_downsample(source_level).unwrap_or(1.0);
        if config.floor_correct_downsampling && source_downsample >= 1.0 {
            source_downsample = source_downsample.floor();
        }

        // Prefer the previous output level as the pixel supply when it sits
        // at least as high a magnification as the source's best base level
        // and the remaining step is at most 2x.
        let read_from_previous = config.progressive_downsample
            && matches!(plans.last(), Some(prev)
                if prev.level + 1 == level as u32
                    && downsample / prev.downsample <= 2.0
                    && prev.downsample <= source_downsample);

        let (supply_downsample, supply_width, supply_height) = if read_from_previous {
            let prev = plans.last().expect("checked above");
            (prev.downsample, prev.width, prev.height)
        } else {
            let (w, h) = source.level_dimensions(source_level).unwrap_or((0, 0));
            (source_downsample, w as i64, h as i64)
        };
        let downsample_of_level = downsample / supply_downsample;

        let scaled = dimension_downsampling(
            config.tile_width,
            config.tile_height,
            supply_width,
            supply_height,
            retile || read_from_previous,
            downsample_of_level,
        );

        let mut width = scaled.level_width;
        let mut height = scaled.level_height;
        // Tile dimensions shrink to the level when it is smaller than one
        // tile; otherwise they stay at the configured size.
        let tile_width = scaled.frame_width;
        let tile_height = scaled.frame_height;
        if config.uniform_pixel_spacing {
            if width > tile_width {
                width -= width % tile_width;
            }
            if height > tile_height {
                height -= height % tile_height;
            }
        }

        let plan = LevelPlan {
            level: level as u32,
            downsample,
            source_level,
            source_downsample,
            downsample_of_level,
            width,
            height,
            tile_width,
            tile_height,
            read_width: (tile_width as f64 * downsample_of_level) as i64,
            read_height: (tile_height as f64 * downsample_of_level) as i64,
            read_from_previous,
            store_raw: false,
        };
        debug!(
            level,
            downsample,
            width,
            height,
            source_level,
            progressive = read_from_previous,
            "planned level"
        );

        if read_from_previous {
            if let Some(prev) = plans.last_mut() {
                prev.store_raw = true;
            }
        }

        let stop = config.stop_downsampling_at_single_frame && plan.single_frame();
        plans.push(plan);
        if stop {
            break;
        }
    }
    plans
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::pixels::PixelBuffer;

    /// A synthetic source with a chosen level geometry and no pixels.
    struct StubSource {
        levels: Vec<(u32, u32, f64)>,
    }

    impl PyramidSource for StubSource {
        fn level_count(&self) -> usize {
            self.levels.len()
        }
        fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
            self.levels.get(level).map(|&(w, h, _)| (w, h))
        }
        fn level_downsample(&self, level: usize) -> Option<f64> {
            self.levels.get(level).map(|&(_, _, d)| d)
        }
        fn best_level_for_downsample(&self, downsample: f64) -> usize {
            let mut best = 0;
            for (idx, &(_, _, d)) in self.levels.iter().enumerate() {
                if d <= downsample * 1.01 {
                    best = idx;
                }
            }
            best
        }
        fn read_region(
            &self,
            _: usize,
            _: i64,
            _: i64,
            w: u32,
            h: u32,
        ) -> Result<PixelBuffer, SourceError> {
            Ok(PixelBuffer::new(w, h))
        }
        fn physical_size_mm(&self) -> Option<(f64, f64)> {
            None
        }
        fn photometric(&self) -> &str {
            "RGB"
        }
    }

    fn config(dir: &tempfile::TempDir) -> Config {
        let input = dir.path().join("slide");
        std::fs::write(&input, b"x").unwrap();
        let mut config = Config::with_defaults(input, dir.path().to_path_buf());
        config.tile_width = 256;
        config.tile_height = 256;
        config
    }

    #[test]
    fn test_mirror_source_pyramid() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(4096, 4096, 1.0), (1024, 1024, 4.0)],
        };
        let plans = plan_levels(&source, &config(&dir));
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].level, 0);
        assert_eq!(plans[0].downsample, 1.0);
        assert_eq!((plans[0].width, plans[0].height), (4096, 4096));
        assert_eq!(plans[0].read_width, 256);
        assert_eq!(plans[1].downsample, 4.0);
        assert_eq!((plans[1].width, plans[1].height), (1024, 1024));
        assert_eq!(plans[1].tile_count(), 16);
        assert!(!plans[1].read_from_previous);
    }

    #[test]
    fn test_retile_defaults_to_powers_of_two() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(4096, 4096, 1.0)],
        };
        let mut cfg = config(&dir);
        cfg.levels = 3;
        let plans = plan_levels(&source, &cfg);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[1].downsample, 2.0);
        assert_eq!((plans[1].width, plans[1].height), (2048, 2048));
        // Each tile of level 1 consumes a 512px square of the source.
        assert_eq!(plans[1].read_width, 512);
        assert_eq!(plans[2].downsample, 4.0);
        // Downsamples strictly increase.
        assert!(plans.windows(2).all(|w| w[0].downsample < w[1].downsample));
    }

    #[test]
    fn test_retile_picks_best_base_level() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(4096, 4096, 1.0), (1024, 1024, 4.0)],
        };
        let mut cfg = config(&dir);
        cfg.levels = 4;
        let plans = plan_levels(&source, &cfg);
        // Levels 0/1 read the base; levels 2/3 read the 4x source level.
        assert_eq!(plans[0].source_level, 0);
        assert_eq!(plans[1].source_level, 0);
        assert_eq!(plans[2].source_level, 1);
        assert_eq!(plans[2].downsample_of_level, 1.0);
        assert_eq!(plans[3].source_level, 1);
        assert_eq!(plans[3].downsample_of_level, 2.0);
    }

    #[test]
    fn test_start_stop_range() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(4096, 4096, 1.0)],
        };
        let mut cfg = config(&dir);
        cfg.levels = 5;
        cfg.start_on = 1;
        cfg.stop_on = 2;
        let plans = plan_levels(&source, &cfg);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].level, 1);
        assert_eq!(plans[1].level, 2);
    }

    #[test]
    fn test_stop_at_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(1000, 1000, 1.0)],
        };
        let mut cfg = config(&dir);
        cfg.levels = 8;
        cfg.stop_downsampling_at_single_frame = true;
        let plans = plan_levels(&source, &cfg);
        // 1000 / 4 = 250 fits a 256px tile: plan ends with level 2.
        assert_eq!(plans.len(), 3);
        assert!(plans.last().unwrap().single_frame());
        assert!(!plans[1].single_frame());
    }

    #[test]
    fn test_progressive_decision() {
        let dir = tempfile::tempdir().unwrap();
        // Source only offers the base level, so every downsample beyond 1
        // would re-read level 0 unless the previous output level serves it.
        let source = StubSource {
            levels: vec![(4096, 4096, 1.0)],
        };
        let mut cfg = config(&dir);
        cfg.levels = 3;
        cfg.progressive_downsample = true;
        let plans = plan_levels(&source, &cfg);
        assert!(!plans[0].read_from_previous);
        assert!(plans[1].read_from_previous);
        assert!(plans[2].read_from_previous);
        // Feeding levels keep raw pixels; the last level does not.
        assert!(plans[0].store_raw);
        assert!(plans[1].store_raw);
        assert!(!plans[2].store_raw);
        // Each progressive level halves the previous one.
        assert_eq!(plans[1].downsample_of_level, 2.0);
        assert_eq!(plans[1].read_width, 512);
        assert_eq!(plans[2].read_width, 512);
    }

    #[test]
    fn test_progressive_not_used_for_large_steps() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(4096, 4096, 1.0)],
        };
        let mut cfg = config(&dir);
        cfg.levels = 2;
        cfg.downsamples = vec![1.0, 8.0];
        cfg.progressive_downsample = true;
        let plans = plan_levels(&source, &cfg);
        // An 8x step from the previous level exceeds the 2x progressive
        // window: the level reads the source directly.
        assert!(!plans[1].read_from_previous);
        assert!(!plans[0].store_raw);
    }

    #[test]
    fn test_uniform_pixel_spacing_crop() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(1000, 700, 1.0)],
        };
        let mut cfg = config(&dir);
        cfg.uniform_pixel_spacing = true;
        let plans = plan_levels(&source, &cfg);
        assert_eq!((plans[0].width, plans[0].height), (768, 512));
        assert_eq!(plans[0].width % plans[0].tile_width, 0);
        assert_eq!(plans[0].height % plans[0].tile_height, 0);
    }

    #[test]
    fn test_crop_keeps_sub_tile_level() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(100, 90, 1.0)],
        };
        let mut cfg = config(&dir);
        cfg.uniform_pixel_spacing = true;
        let plans = plan_levels(&source, &cfg);
        // Smaller than one tile: nothing to crop away.
        assert_eq!((plans[0].width, plans[0].height), (100, 90));
    }

    #[test]
    fn test_floor_correct_downsampling() {
        let dir = tempfile::tempdir().unwrap();
        let source = StubSource {
            levels: vec![(45771, 35037, 1.0), (2860, 2189, 16.004892)],
        };
        let mut cfg = config(&dir);
        cfg.floor_correct_downsampling = true;
        let plans = plan_levels(&source, &cfg);
        assert_eq!(plans[1].source_downsample, 16.0);
    }
}
