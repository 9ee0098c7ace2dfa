//! File-format layer: TIFF/SVS structure parsing.
//!
//! Tile codestream assembly (completing Aperio abbreviated JPEG tiles from
//! the per-IFD JPEGTables) lives with the tile placement data in
//! [`tiff::TileData`].

pub mod tiff;
