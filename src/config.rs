//! Configuration management.
//!
//! All conversion options are plain CLI arguments (with `WSI_` environment
//! fallbacks) collected into one [`Config`] that the library consumes
//! directly. `validate()` reports the first problem; nothing else runs
//! before it passes.

use std::path::PathBuf;

use clap::Parser;

use crate::codec::Codec;
use crate::error::ConfigError;
use crate::frame::FilterKernel;

// =============================================================================
// Default Values
// =============================================================================

/// Default output tile edge in pixels.
pub const DEFAULT_TILE_SIZE: i64 = 500;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = 80;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Convert a whole-slide image into a DICOM WSI pyramid.
///
/// Accepts Aperio SVS and pyramidal TIFF slides, existing WSI DICOM files,
/// and plain raster images. Emits one or more multi-frame DICOM instances
/// per pyramid level into the output folder.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-dicomizer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Input slide file.
    #[arg(long, env = "WSI_INPUT")]
    pub input: PathBuf,

    /// Folder DICOM instances are written into.
    #[arg(long, default_value = "./", env = "WSI_OUT_FOLDER")]
    pub out_folder: PathBuf,

    /// Output tile width in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_width: i64,

    /// Output tile height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_height: i64,

    /// Frame compression: jpeg, jpeg2000, or raw (alias none).
    #[arg(long, default_value = "jpeg")]
    pub compression: String,

    /// JPEG quality (1-100); ignored by other codecs.
    #[arg(long, default_value_t = DEFAULT_QUALITY)]
    pub quality: u8,

    /// First pyramid level to emit.
    #[arg(long, default_value_t = 0)]
    pub start_on: i32,

    /// Last pyramid level to emit (-1 = through the last planned level).
    #[arg(long, default_value_t = -1)]
    pub stop_on: i32,

    /// Number of output levels; 0 mirrors the source pyramid.
    #[arg(long, default_value_t = 0)]
    pub levels: i32,

    /// Downsample factor per output level; missing or non-positive entries
    /// default to 2^level. Only meaningful with --levels.
    #[arg(long, num_args = 0.., value_delimiter = ',')]
    pub downsamples: Vec<f64>,

    /// Use TILED_SPARSE frame organization with per-frame positions
    /// (default is TILED_FULL).
    #[arg(long, default_value_t = false)]
    pub sparse: bool,

    /// Maximum frames per output file; 0 or negative writes one file per
    /// level, however large.
    #[arg(long, default_value_t = 0)]
    pub batch: i32,

    /// Worker threads; non-positive consumes all available parallelism.
    #[arg(long, default_value_t = -1)]
    pub threads: i32,

    /// Stop planning levels once one fits in a single tile.
    #[arg(long, default_value_t = false)]
    pub stop_downsampling_at_single_frame: bool,

    /// Use the area-weighted bilinear resampler instead of nearest.
    #[arg(long, default_value_t = false)]
    pub bilinear_downsampling: bool,

    /// Resample with this kernel (nearest, linear, cubic, area, lanczos).
    /// Takes precedence over --bilinear-downsampling.
    #[arg(long)]
    pub opencv_downsampling: Option<String>,

    /// Floor the source's reported level downsamples for pixel alignment.
    /// Only defined for integer caller downsamples; fractional factors
    /// pass through unchanged.
    #[arg(long, default_value_t = false)]
    pub floor_correct_downsampling: bool,

    /// Generate each level from the previous output level when it is at
    /// higher magnification than the best source level.
    #[arg(long, default_value_t = false)]
    pub progressive_downsample: bool,

    /// Crop level dimensions down to whole multiples of the tile size.
    #[arg(long, default_value_t = false)]
    pub uniform_pixel_spacing: bool,

    /// Offset source reads by one pixel to drop the scanner edge artifact
    /// row and column.
    #[arg(long, default_value_t = false)]
    pub drop_first_row_and_column: bool,

    /// StudyInstanceUID; generated when omitted.
    #[arg(long, default_value = "")]
    pub study_id: String,

    /// SeriesInstanceUID; generated when omitted.
    #[arg(long, default_value = "")]
    pub series_id: String,

    /// Series description written to every instance.
    #[arg(long, default_value = "")]
    pub series_description: String,

    /// DICOM JSON file with additional tags merged into every instance.
    #[arg(long)]
    pub json_file: Option<PathBuf>,

    /// Physical height in millimetres for plain-image inputs.
    #[arg(long)]
    pub image_height_mm: Option<f64>,

    /// Verbose (debug-level) logging.
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl Config {
    /// Validate option values and the input/output paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input.exists() {
            return Err(ConfigError::InputNotFound(self.input.clone()));
        }
        if !self.out_folder.is_dir() {
            return Err(ConfigError::OutputNotFound(self.out_folder.clone()));
        }
        if Codec::from_name(&self.compression).is_none() {
            return Err(ConfigError::UnknownCompression(self.compression.clone()));
        }
        if self.quality == 0 || self.quality > 100 {
            return Err(ConfigError::InvalidOption {
                option: "quality",
                message: "must be between 1 and 100".to_string(),
            });
        }
        if self.tile_width <= 0 || self.tile_height <= 0 {
            return Err(ConfigError::InvalidOption {
                option: "tile-width/tile-height",
                message: "must be positive".to_string(),
            });
        }
        if self.levels < 0 {
            return Err(ConfigError::InvalidOption {
                option: "levels",
                message: "must not be negative".to_string(),
            });
        }
        if self.start_on < 0 {
            return Err(ConfigError::InvalidOption {
                option: "start-on",
                message: "must not be negative".to_string(),
            });
        }
        if let Some(ref kernel) = self.opencv_downsampling {
            if FilterKernel::from_name(kernel).is_none() {
                return Err(ConfigError::InvalidOption {
                    option: "opencv-downsampling",
                    message: format!("unknown kernel {kernel:?}"),
                });
            }
        }
        Ok(())
    }

    /// The parsed output codec. Call after `validate()`.
    pub fn codec(&self) -> Codec {
        Codec::from_name(&self.compression).unwrap_or(Codec::Jpeg)
    }

    /// Whether retiling (explicit level count) is requested.
    pub fn retile(&self) -> bool {
        self.levels > 0
    }

    /// Downsample for a retiled output level.
    pub fn downsample_for_level(&self, level: usize) -> f64 {
        match self.downsamples.get(level) {
            Some(&d) if d >= 1.0 => d,
            _ => (1i64 << level.min(62)) as f64,
        }
    }

    /// Frames-per-file limit; `None` means unlimited.
    pub fn batch_limit(&self) -> Option<u32> {
        (self.batch > 0).then_some(self.batch as u32)
    }

    /// Worker pool size.
    pub fn worker_threads(&self) -> usize {
        if self.threads >= 1 {
            self.threads as usize
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// A config with library defaults for the given input/output, matching
    /// the CLI defaults. Used by tests and embedders.
    pub fn with_defaults(input: PathBuf, out_folder: PathBuf) -> Self {
        Self {
            input,
            out_folder,
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            compression: "jpeg".to_string(),
            quality: DEFAULT_QUALITY,
            start_on: 0,
            stop_on: -1,
            levels: 0,
            downsamples: Vec::new(),
            sparse: false,
            batch: 0,
            threads: -1,
            stop_downsampling_at_single_frame: false,
            bilinear_downsampling: false,
            opencv_downsampling: None,
            floor_correct_downsampling: false,
            progressive_downsample: false,
            uniform_pixel_spacing: false,
            drop_first_row_and_column: false,
            study_id: String::new(),
            series_id: String::new(),
            series_description: String::new(),
            json_file: None,
            image_height_mm: None,
            debug: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
