//! Tiled pyramidal TIFF parsing (classic TIFF and BigTIFF).
//!
//! Whole-slide scanners store the resolution pyramid as a chain of tiled
//! IFDs; Aperio SVS additionally keeps per-file JPEG tables and
//! magnification metadata in the first IFD's ImageDescription.

mod parser;
mod pyramid;
mod tags;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag};
