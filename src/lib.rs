//! # WSI Dicomizer
//!
//! Convert Whole Slide Images (WSI) into multi-frame DICOM WSI instances.
//!
//! Given one source image that may be tens of gigapixels, the converter
//! emits a complete image pyramid: each level is a grid of fixed-size
//! compressed tiles ("frames") packaged into one or more DICOM files per
//! level, with correct spatial, tiling, concatenation, and provenance
//! metadata.
//!
//! ## Features
//!
//! - **Format support**: Native parsers for Aperio SVS and pyramidal TIFF;
//!   existing WSI DICOM files and plain rasters also work as inputs
//! - **Codecs**: JPEG baseline, lossless JPEG 2000, and uncompressed frames
//! - **Resampling**: nearest, area-weighted bilinear, or configurable
//!   filter kernels
//! - **Progressive downsampling**: lower levels can be generated from the
//!   previous output level instead of re-reading the source
//! - **Parallel**: one worker pool drives tile production and file writes
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - byte-range reads over local files
//! - [`mod@format`] - TIFF/SVS structure parsing and tile codestream assembly
//! - [`codec`] - frame encoders/decoders and the raw-cache compressor
//! - [`dicom`] - DICOM data sets, part-10 writing and parsing
//! - [`source`] - pyramid sources (SVS/TIFF, DICOM, plain image)
//! - [`frame`] - output tiles and their resampling kernels
//! - [`pyramid`] - level planning, region reads, instance assembly, and
//!   the scheduler
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_dicomizer::{convert, Config};
//!
//! let config = Config::with_defaults(
//!     "slide.svs".into(),
//!     "./out".into(),
//! );
//! let report = convert(&config).expect("conversion failed");
//! for level in &report.levels {
//!     println!("level {}: {} frames", level.level, level.frames);
//! }
//! ```

pub mod codec;
pub mod config;
pub mod dicom;
pub mod error;
pub mod format;
pub mod frame;
pub mod geometry;
pub mod io;
pub mod pixels;
pub mod pyramid;
pub mod source;

// Re-export commonly used types
pub use codec::Codec;
pub use config::Config;
pub use error::{CodecError, ConfigError, ConvertError, DicomError, SourceError, TiffError};
pub use frame::{FilterKernel, Frame, PixelSupply, Resampler};
pub use pixels::PixelBuffer;
pub use pyramid::{convert, ConversionReport, InstanceBuilder, LevelPlan, LevelReport, RegionReader};
pub use source::{
    detect_format, open_source, DicomSlideSource, ImageSlideSource, PyramidSource, SourceFormat,
    TiffSlideSource,
};
