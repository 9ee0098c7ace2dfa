//! TIFF header and IFD parsing.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, RangeReader,
};

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        match version {
            VERSION_TIFF => {
                let first_ifd_offset = byte_order.read_u32(&bytes[4..8]) as u64;
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: false,
                    first_ifd_offset,
                })
            }
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                let first_ifd_offset = byte_order.read_u64(&bytes[8..16]);
                if first_ifd_offset >= file_size {
                    return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
                }
                Ok(TiffHeader {
                    byte_order,
                    is_bigtiff: true,
                    first_ifd_offset,
                })
            }
            _ => Err(TiffError::InvalidVersion(version)),
        }
    }

    /// Size of an IFD entry in bytes (12 classic, 20 BigTIFF).
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the value/offset field in an IFD entry.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One entry (tag) of an Image File Directory.
#[derive(Debug, Clone)]
pub struct IfdEntry {
    /// Numeric tag identifier
    pub tag_id: u16,

    /// Value data type
    pub field_type: FieldType,

    /// Number of values
    pub count: u64,

    /// The raw value/offset field bytes (4 for classic TIFF, 8 for BigTIFF)
    pub value_offset_bytes: Vec<u8>,

    /// Whether the value is stored inline in `value_offset_bytes`
    pub is_inline: bool,
}

impl IfdEntry {
    /// Total size in bytes of this entry's value data.
    pub fn value_size(&self) -> usize {
        self.field_type.size() * self.count as usize
    }

    /// The file offset the value is stored at, for out-of-line values.
    pub fn value_offset(&self, header: &TiffHeader) -> u64 {
        if header.is_bigtiff {
            header.byte_order.read_u64(&self.value_offset_bytes)
        } else {
            header.byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Read this entry's raw value bytes (inline or from the file).
    pub fn read_raw<R: RangeReader>(
        &self,
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Bytes, TiffError> {
        let size = self.value_size();
        if self.is_inline {
            Ok(Bytes::copy_from_slice(&self.value_offset_bytes[..size]))
        } else {
            reader
                .read_exact_at(self.value_offset(header), size)
                .map_err(|e| TiffError::InvalidTagValue {
                    tag: "value",
                    message: e.to_string(),
                })
        }
    }

    /// Read this entry as an array of unsigned integers, widening to u64.
    pub fn read_u64_array<R: RangeReader>(
        &self,
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<u64>, TiffError> {
        let raw = self.read_raw(reader, header)?;
        let bo = header.byte_order;
        let mut values = Vec::with_capacity(self.count as usize);
        match self.field_type {
            FieldType::Byte => values.extend(raw.iter().map(|&b| b as u64)),
            FieldType::Short => {
                for chunk in raw.chunks_exact(2) {
                    values.push(bo.read_u16(chunk) as u64);
                }
            }
            FieldType::Long => {
                for chunk in raw.chunks_exact(4) {
                    values.push(bo.read_u32(chunk) as u64);
                }
            }
            FieldType::Long8 => {
                for chunk in raw.chunks_exact(8) {
                    values.push(bo.read_u64(chunk));
                }
            }
            other => {
                return Err(TiffError::InvalidTagValue {
                    tag: "integer array",
                    message: format!("field type {other:?} is not an unsigned integer"),
                })
            }
        }
        Ok(values)
    }

    /// Read the first value of this entry as a u64.
    pub fn read_u64_first<R: RangeReader>(
        &self,
        reader: &R,
        header: &TiffHeader,
    ) -> Result<u64, TiffError> {
        self.read_u64_array(reader, header)?
            .first()
            .copied()
            .ok_or(TiffError::InvalidTagValue {
                tag: "integer",
                message: "empty value".to_string(),
            })
    }

    /// Read this entry as ASCII text (without trailing NULs).
    pub fn read_ascii<R: RangeReader>(
        &self,
        reader: &R,
        header: &TiffHeader,
    ) -> Result<String, TiffError> {
        let raw = self.read_raw(reader, header)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone)]
pub struct Ifd {
    /// Entries in file order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next IFD in the chain (0 = end)
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Number of bytes an IFD with `entry_count` entries occupies.
    pub fn byte_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.ifd_count_size()
            + entry_count as usize * header.ifd_entry_size()
            + header.value_offset_size()
    }

    /// Parse an IFD from its raw bytes (count field through next-IFD offset).
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let bo = header.byte_order;
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }
        let entry_count = if header.is_bigtiff {
            bo.read_u64(&bytes[..8])
        } else {
            bo.read_u16(&bytes[..2]) as u64
        };
        let needed = Self::byte_size(entry_count, header);
        if bytes.len() < needed {
            return Err(TiffError::FileTooSmall {
                required: needed as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let value_size = header.value_offset_size();
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut pos = count_size;
        for _ in 0..entry_count {
            let tag_id = bo.read_u16(&bytes[pos..pos + 2]);
            let field_type = FieldType::from_u16(bo.read_u16(&bytes[pos + 2..pos + 4]));
            let count = if header.is_bigtiff {
                bo.read_u64(&bytes[pos + 4..pos + 12])
            } else {
                bo.read_u32(&bytes[pos + 4..pos + 8]) as u64
            };
            let value_start = pos + entry_size - value_size;
            let value_offset_bytes = bytes[value_start..value_start + value_size].to_vec();
            pos += entry_size;

            // Entries with unknown field types are skipped rather than fatal;
            // scanners routinely emit private tags.
            let field_type = match field_type {
                Ok(ft) => ft,
                Err(_) => continue,
            };
            let is_inline = field_type.size() * count as usize <= value_size;
            entries.push(IfdEntry {
                tag_id,
                field_type,
                count,
                value_offset_bytes,
                is_inline,
            });
        }

        let next_ifd_offset = if header.is_bigtiff {
            bo.read_u64(&bytes[pos..pos + 8])
        } else {
            bo.read_u32(&bytes[pos..pos + 4]) as u64
        };

        Ok(Ifd {
            entries,
            next_ifd_offset,
        })
    }

    /// Find an entry by tag.
    pub fn entry(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag_id == tag.id())
    }

    /// Whether the IFD describes a tiled image.
    pub fn is_tiled(&self) -> bool {
        self.entry(TiffTag::TileWidth).is_some() && self.entry(TiffTag::TileLength).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
