//! TIFF tag and field-type constants used by the pyramid walk.

use crate::error::TiffError;

// =============================================================================
// FieldType
// =============================================================================

/// Data type of an IFD entry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 8-bit unsigned integer
    Byte = 1,
    /// 7-bit ASCII with NUL terminator
    Ascii = 2,
    /// 16-bit unsigned integer
    Short = 3,
    /// 32-bit unsigned integer
    Long = 4,
    /// Two Longs: numerator, denominator
    Rational = 5,
    /// Opaque bytes
    Undefined = 7,
    /// 64-bit unsigned integer (BigTIFF)
    Long8 = 16,
}

impl FieldType {
    /// Create a FieldType from its numeric value.
    pub fn from_u16(value: u16) -> Result<Self, TiffError> {
        match value {
            1 => Ok(FieldType::Byte),
            2 => Ok(FieldType::Ascii),
            3 => Ok(FieldType::Short),
            4 => Ok(FieldType::Long),
            5 => Ok(FieldType::Rational),
            7 => Ok(FieldType::Undefined),
            16 => Ok(FieldType::Long8),
            other => Err(TiffError::UnknownFieldType(other)),
        }
    }

    /// Size of one value of this type in bytes.
    pub fn size(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 => 8,
        }
    }
}

// =============================================================================
// TiffTag
// =============================================================================

/// Tags the pyramid reader cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffTag {
    ImageWidth = 256,
    ImageLength = 257,
    Compression = 259,
    PhotometricInterpretation = 262,
    ImageDescription = 270,
    SamplesPerPixel = 277,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,
    JpegTables = 347,
}

impl TiffTag {
    pub fn id(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Compression
// =============================================================================

/// TIFF compression schemes found in slide files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression
    None,
    /// JPEG (baseline)
    Jpeg,
    /// Aperio JPEG 2000 YCbCr (33003) or RGB (33005)
    Jpeg2000,
    /// Anything else (LZW, Deflate, old-style JPEG, ...)
    Other(u16),
}

impl Compression {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Compression::None,
            7 => Compression::Jpeg,
            33003 | 33005 => Compression::Jpeg2000,
            other => Compression::Other(other),
        }
    }

    /// Whether the tile decode path understands this scheme.
    pub fn is_supported(self) -> bool {
        matches!(self, Compression::Jpeg | Compression::Jpeg2000)
    }

    /// Human-readable name for error messages.
    pub fn name(self) -> String {
        match self {
            Compression::None => "uncompressed".to_string(),
            Compression::Jpeg => "JPEG".to_string(),
            Compression::Jpeg2000 => "JPEG 2000".to_string(),
            Compression::Other(v) => format!("unknown ({v})"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_from_u16() {
        assert_eq!(FieldType::from_u16(3).unwrap(), FieldType::Short);
        assert_eq!(FieldType::from_u16(16).unwrap(), FieldType::Long8);
        assert!(FieldType::from_u16(99).is_err());
    }

    #[test]
    fn test_field_type_sizes() {
        assert_eq!(FieldType::Byte.size(), 1);
        assert_eq!(FieldType::Short.size(), 2);
        assert_eq!(FieldType::Long.size(), 4);
        assert_eq!(FieldType::Long8.size(), 8);
        assert_eq!(FieldType::Rational.size(), 8);
    }

    #[test]
    fn test_tag_ids() {
        assert_eq!(TiffTag::ImageWidth.id(), 256);
        assert_eq!(TiffTag::TileOffsets.id(), 324);
        assert_eq!(TiffTag::JpegTables.id(), 347);
    }

    #[test]
    fn test_compression_mapping() {
        assert_eq!(Compression::from_u16(7), Compression::Jpeg);
        assert_eq!(Compression::from_u16(33003), Compression::Jpeg2000);
        assert_eq!(Compression::from_u16(33005), Compression::Jpeg2000);
        assert_eq!(Compression::from_u16(5), Compression::Other(5));
        assert!(Compression::Jpeg.is_supported());
        assert!(!Compression::Other(5).is_supported());
    }
}
