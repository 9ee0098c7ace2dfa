//! TIFF pyramid level identification.
//!
//! WSI files contain multiple IFDs, but not all are pyramid levels: slides
//! typically also carry a label, a macro overview, and a thumbnail. Pyramid
//! levels are the tiled IFDs, ordered by decreasing area; the largest is
//! level 0 and downsamples derive from its dimensions.

use bytes::{Bytes, BytesMut};

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{Compression, TiffTag};

/// Maximum number of IFDs to walk (safety limit).
const MAX_IFDS: usize = 100;

// =============================================================================
// PyramidLevel
// =============================================================================

/// A single level in the image pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Index of this level in the pyramid (0 = highest resolution)
    pub level_index: usize,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    /// Downsample factor relative to level 0 (1.0 for level 0)
    pub downsample: f64,

    /// Tile compression scheme
    pub compression: Compression,

    /// The parsed IFD for this level
    pub ifd: Ifd,
}

impl PyramidLevel {
    fn from_ifd<R: RangeReader>(
        ifd: Ifd,
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Option<Self>, TiffError> {
        if !ifd.is_tiled() {
            return Ok(None);
        }
        let width = match ifd.entry(TiffTag::ImageWidth) {
            Some(e) => e.read_u64_first(reader, header)? as u32,
            None => return Ok(None),
        };
        let height = match ifd.entry(TiffTag::ImageLength) {
            Some(e) => e.read_u64_first(reader, header)? as u32,
            None => return Ok(None),
        };
        let tile_width = ifd
            .entry(TiffTag::TileWidth)
            .ok_or(TiffError::MissingTag("TileWidth"))?
            .read_u64_first(reader, header)? as u32;
        let tile_height = ifd
            .entry(TiffTag::TileLength)
            .ok_or(TiffError::MissingTag("TileLength"))?
            .read_u64_first(reader, header)? as u32;
        if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 {
            return Ok(None);
        }
        let compression = match ifd.entry(TiffTag::Compression) {
            Some(e) => Compression::from_u16(e.read_u64_first(reader, header)? as u16),
            None => Compression::Jpeg,
        };

        Ok(Some(PyramidLevel {
            level_index: 0,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: (width + tile_width - 1) / tile_width,
            tiles_y: (height + tile_height - 1) / tile_height,
            downsample: 1.0,
            compression,
            ifd,
        }))
    }

    /// Flattened tile index of (tile_x, tile_y), or None when out of bounds.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// A parsed TIFF image pyramid.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    /// The TIFF header
    pub header: TiffHeader,

    /// Pyramid levels, sorted by resolution (0 = highest)
    pub levels: Vec<PyramidLevel>,

    /// ImageDescription of the base IFD (Aperio metadata lives here)
    pub image_description: Option<String>,
}

impl TiffPyramid {
    /// Parse a TIFF file and identify pyramid levels.
    pub fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header_len = BIGTIFF_HEADER_SIZE.min(reader.size() as usize);
        let header_bytes = reader
            .read_exact_at(0, header_len)
            .map_err(|e| TiffError::InvalidTagValue {
                tag: "header",
                message: e.to_string(),
            })?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let mut levels = Vec::new();
        let mut offset = header.first_ifd_offset;
        let mut walked = 0usize;
        while offset != 0 && walked < MAX_IFDS {
            let count_bytes = reader
                .read_exact_at(offset, header.ifd_count_size())
                .map_err(|e| TiffError::InvalidTagValue {
                    tag: "IFD",
                    message: e.to_string(),
                })?;
            let entry_count = if header.is_bigtiff {
                header.byte_order.read_u64(&count_bytes)
            } else {
                header.byte_order.read_u16(&count_bytes) as u64
            };
            let ifd_size = Ifd::byte_size(entry_count, &header);
            let ifd_bytes = reader.read_exact_at(offset, ifd_size).map_err(|e| {
                TiffError::InvalidTagValue {
                    tag: "IFD",
                    message: e.to_string(),
                }
            })?;
            let ifd = Ifd::parse(&ifd_bytes, &header)?;
            offset = ifd.next_ifd_offset;
            walked += 1;

            if let Some(level) = PyramidLevel::from_ifd(ifd, reader, &header)? {
                levels.push(level);
            }
        }

        if levels.is_empty() {
            return Err(TiffError::StripOrganization);
        }

        // Largest area first = level 0; derive downsamples from it.
        levels.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));
        let (base_w, base_h) = (levels[0].width as f64, levels[0].height as f64);
        for (idx, level) in levels.iter_mut().enumerate() {
            level.level_index = idx;
            level.downsample =
                (base_w / level.width as f64 + base_h / level.height as f64) / 2.0;
        }

        let image_description = levels[0]
            .ifd
            .entry(TiffTag::ImageDescription)
            .map(|e| e.read_ascii(reader, &header))
            .transpose()?;

        Ok(TiffPyramid {
            header,
            levels,
            image_description,
        })
    }

    /// Number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Get a pyramid level by index.
    pub fn level(&self, index: usize) -> Option<&PyramidLevel> {
        self.levels.get(index)
    }

    /// Dimensions of the base (highest resolution) level.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.levels[0].width, self.levels[0].height)
    }

    /// The coarsest level whose downsample is ≤ the requested factor.
    ///
    /// Falls back to level 0 for factors below 1.
    pub fn best_level_for_downsample(&self, downsample: f64) -> usize {
        let mut best = 0;
        for level in &self.levels {
            // Small tolerance for scanners that report e.g. 4.00001.
            if level.downsample <= downsample * 1.01 {
                best = level.level_index;
            }
        }
        best
    }

    /// Microns-per-pixel of level 0, parsed from Aperio ImageDescription
    /// (`|MPP = 0.499|`) when present.
    pub fn microns_per_pixel(&self) -> Option<f64> {
        let description = self.image_description.as_deref()?;
        for field in description.split('|') {
            let mut parts = field.splitn(2, '=');
            let key = parts.next()?.trim();
            if key.eq_ignore_ascii_case("MPP") {
                return parts.next()?.trim().parse().ok();
            }
        }
        None
    }
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tile placement data for one pyramid level.
#[derive(Debug, Clone)]
pub struct TileData {
    /// Byte offset of each tile in the file
    pub offsets: Vec<u64>,

    /// Byte count (size) of each tile
    pub byte_counts: Vec<u64>,

    /// JPEGTables data (if present)
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    /// Load tile placement data for a pyramid level.
    pub fn load<R: RangeReader>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let offsets = level
            .ifd
            .entry(TiffTag::TileOffsets)
            .ok_or(TiffError::MissingTag("TileOffsets"))?
            .read_u64_array(reader, header)?;
        let byte_counts = level
            .ifd
            .entry(TiffTag::TileByteCounts)
            .ok_or(TiffError::MissingTag("TileByteCounts"))?
            .read_u64_array(reader, header)?;
        let jpeg_tables = level
            .ifd
            .entry(TiffTag::JpegTables)
            .map(|e| e.read_raw(reader, header))
            .transpose()?;
        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and size for a specific tile.
    pub fn tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        if idx >= self.offsets.len() || idx >= self.byte_counts.len() {
            return None;
        }
        Some((self.offsets[idx], self.byte_counts[idx]))
    }

    /// Assemble a decodable JPEG codestream for one tile.
    ///
    /// Aperio SVS tiles are abbreviated: the quantization and Huffman
    /// tables are stored once per IFD in the JPEGTables tag, and each tile
    /// begins directly at its frame header. A decodable stream is rebuilt
    /// by emitting SOI, then the table-class segments (DQT, DHT, DRI)
    /// lifted out of JPEGTables, then the tile's own segments and entropy
    /// data. Tiles that define a quantization table themselves pass
    /// through untouched, as does everything when the IFD carries no
    /// tables.
    pub fn complete_jpeg(&self, tile: &[u8]) -> Bytes {
        if tile.len() < 4 {
            return Bytes::copy_from_slice(tile);
        }
        let tile_segments = walk_jpeg_segments(tile);
        let tile_defines_tables = tile_segments
            .iter()
            .any(|s| s.class() == SegmentClass::Table);
        let Some(tables) = self.jpeg_tables.as_deref() else {
            return Bytes::copy_from_slice(tile);
        };
        if tile_defines_tables {
            return Bytes::copy_from_slice(tile);
        }

        let mut out = BytesMut::with_capacity(tables.len() + tile.len());
        out.extend_from_slice(&[0xFF, MARKER_SOI]);
        for segment in walk_jpeg_segments(tables) {
            if segment.class() == SegmentClass::Table {
                out.extend_from_slice(&tables[segment.start..segment.end]);
            }
        }
        // Everything of the tile except its SOI, entropy data included.
        let body_start = match tile_segments.first() {
            Some(first) if first.code == MARKER_SOI => first.end,
            _ => 0,
        };
        out.extend_from_slice(&tile[body_start..]);
        out.freeze()
    }
}

// =============================================================================
// JPEG segment walking
// =============================================================================

const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;
const MARKER_DQT: u8 = 0xDB;
const MARKER_DHT: u8 = 0xC4;
const MARKER_DRI: u8 = 0xDD;
const MARKER_TEM: u8 = 0x01;

/// What role a segment plays when reassembling a tile codestream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentClass {
    /// Table-class segments hoisted from JPEGTables (DQT, DHT, DRI).
    Table,
    /// Everything else (SOI/EOI, frame headers, APPn, scans).
    Other,
}

/// One marker segment: its code and the byte range it spans, marker
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JpegSegment {
    code: u8,
    start: usize,
    end: usize,
}

impl JpegSegment {
    fn class(&self) -> SegmentClass {
        match self.code {
            MARKER_DQT | MARKER_DHT | MARKER_DRI => SegmentClass::Table,
            _ => SegmentClass::Other,
        }
    }
}

/// Whether a marker stands alone, with no length field or payload.
fn is_standalone_marker(code: u8) -> bool {
    matches!(code, MARKER_SOI | MARKER_EOI | MARKER_TEM | 0xD0..=0xD7)
}

/// Walk the marker segments of a JPEG stream, up to and including SOS.
///
/// The entropy-coded data following SOS is not segmented, so the walk
/// stops there; a truncated trailing segment ends the walk early rather
/// than failing.
fn walk_jpeg_segments(data: &[u8]) -> Vec<JpegSegment> {
    let mut segments = Vec::new();
    let mut cursor = 0usize;
    while cursor + 1 < data.len() {
        if data[cursor] != 0xFF {
            // Tolerate stray bytes between segments.
            cursor += 1;
            continue;
        }
        let code = data[cursor + 1];
        if code == 0xFF {
            // Fill byte before the real marker.
            cursor += 1;
            continue;
        }
        let end = if is_standalone_marker(code) {
            cursor + 2
        } else {
            if cursor + 4 > data.len() {
                break;
            }
            let payload = u16::from_be_bytes([data[cursor + 2], data[cursor + 3]]) as usize;
            cursor + 2 + payload
        };
        if end > data.len() {
            break;
        }
        segments.push(JpegSegment {
            code,
            start: cursor,
            end,
        });
        if code == MARKER_SOS {
            break;
        }
        cursor = end;
    }
    segments
}

// =============================================================================
// Tests
// =============================================================================
