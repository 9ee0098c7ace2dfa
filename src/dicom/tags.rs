//! Tags emitted or consumed by the pipeline.

use std::fmt;

/// A DICOM (group, element) tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub u16, pub u16);

impl Tag {
    pub fn group(self) -> u16 {
        self.0
    }

    pub fn element(self) -> u16 {
        self.1
    }

    /// Parse the eight-hex-digit form used by the DICOM JSON model.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 8 {
            return None;
        }
        let group = u16::from_str_radix(&s[..4], 16).ok()?;
        let element = u16::from_str_radix(&s[4..], 16).ok()?;
        Some(Tag(group, element))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

// -----------------------------------------------------------------------------
// File meta (group 0002)
// -----------------------------------------------------------------------------

pub const FILE_META_GROUP_LENGTH: Tag = Tag(0x0002, 0x0000);
pub const FILE_META_VERSION: Tag = Tag(0x0002, 0x0001);
pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag(0x0002, 0x0002);
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag(0x0002, 0x0003);
pub const TRANSFER_SYNTAX_UID: Tag = Tag(0x0002, 0x0010);
pub const IMPLEMENTATION_CLASS_UID: Tag = Tag(0x0002, 0x0012);
pub const IMPLEMENTATION_VERSION_NAME: Tag = Tag(0x0002, 0x0013);

// -----------------------------------------------------------------------------
// Identification
// -----------------------------------------------------------------------------

pub const IMAGE_TYPE: Tag = Tag(0x0008, 0x0008);
pub const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
pub const SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x0018);
pub const CONTENT_DATE: Tag = Tag(0x0008, 0x0023);
pub const CONTENT_TIME: Tag = Tag(0x0008, 0x0033);
pub const MODALITY: Tag = Tag(0x0008, 0x0060);
pub const SERIES_DESCRIPTION: Tag = Tag(0x0008, 0x103E);

pub const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
pub const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
pub const INSTANCE_NUMBER: Tag = Tag(0x0020, 0x0013);
pub const FRAME_OF_REFERENCE_UID: Tag = Tag(0x0020, 0x0052);

// -----------------------------------------------------------------------------
// Concatenation and dimensions
// -----------------------------------------------------------------------------

pub const DIMENSION_INDEX_VALUES: Tag = Tag(0x0020, 0x9157);
pub const CONCATENATION_UID: Tag = Tag(0x0020, 0x9161);
pub const IN_CONCATENATION_NUMBER: Tag = Tag(0x0020, 0x9162);
pub const IN_CONCATENATION_TOTAL_NUMBER: Tag = Tag(0x0020, 0x9163);
pub const DIMENSION_ORGANIZATION_UID: Tag = Tag(0x0020, 0x9164);
pub const DIMENSION_INDEX_POINTER: Tag = Tag(0x0020, 0x9165);
pub const FUNCTIONAL_GROUP_POINTER: Tag = Tag(0x0020, 0x9167);
pub const FRAME_CONTENT_SEQUENCE: Tag = Tag(0x0020, 0x9111);
pub const DIMENSION_ORGANIZATION_SEQUENCE: Tag = Tag(0x0020, 0x9221);
pub const DIMENSION_INDEX_SEQUENCE: Tag = Tag(0x0020, 0x9222);
pub const CONCATENATION_FRAME_OFFSET_NUMBER: Tag = Tag(0x0020, 0x9228);
pub const DIMENSION_ORGANIZATION_TYPE: Tag = Tag(0x0020, 0x9311);

// -----------------------------------------------------------------------------
// Image pixel description
// -----------------------------------------------------------------------------

pub const SAMPLES_PER_PIXEL: Tag = Tag(0x0028, 0x0002);
pub const PHOTOMETRIC_INTERPRETATION: Tag = Tag(0x0028, 0x0004);
pub const PLANAR_CONFIGURATION: Tag = Tag(0x0028, 0x0006);
pub const NUMBER_OF_FRAMES: Tag = Tag(0x0028, 0x0008);
pub const FRAME_INCREMENT_POINTER: Tag = Tag(0x0028, 0x0009);
pub const ROWS: Tag = Tag(0x0028, 0x0010);
pub const COLUMNS: Tag = Tag(0x0028, 0x0011);
pub const PIXEL_SPACING: Tag = Tag(0x0028, 0x0030);
pub const BITS_ALLOCATED: Tag = Tag(0x0028, 0x0100);
pub const BITS_STORED: Tag = Tag(0x0028, 0x0101);
pub const HIGH_BIT: Tag = Tag(0x0028, 0x0102);
pub const PIXEL_REPRESENTATION: Tag = Tag(0x0028, 0x0103);
pub const LOSSY_IMAGE_COMPRESSION: Tag = Tag(0x0028, 0x2110);
pub const REPRESENTATIVE_FRAME_NUMBER: Tag = Tag(0x0028, 0x6010);
pub const PIXEL_MEASURES_SEQUENCE: Tag = Tag(0x0028, 0x9110);

// -----------------------------------------------------------------------------
// Whole slide microscopy
// -----------------------------------------------------------------------------

pub const IMAGED_VOLUME_WIDTH: Tag = Tag(0x0048, 0x0001);
pub const IMAGED_VOLUME_HEIGHT: Tag = Tag(0x0048, 0x0002);
pub const TOTAL_PIXEL_MATRIX_COLUMNS: Tag = Tag(0x0048, 0x0006);
pub const TOTAL_PIXEL_MATRIX_ROWS: Tag = Tag(0x0048, 0x0007);
pub const IMAGE_ORIENTATION_SLIDE: Tag = Tag(0x0048, 0x0102);
pub const PLANE_POSITION_SLIDE_SEQUENCE: Tag = Tag(0x0048, 0x021A);
pub const COLUMN_POSITION_IN_TOTAL_IMAGE_PIXEL_MATRIX: Tag = Tag(0x0048, 0x021E);
pub const ROW_POSITION_IN_TOTAL_IMAGE_PIXEL_MATRIX: Tag = Tag(0x0048, 0x021F);

// -----------------------------------------------------------------------------
// Functional groups and pixel data
// -----------------------------------------------------------------------------

pub const SHARED_FUNCTIONAL_GROUPS_SEQUENCE: Tag = Tag(0x5200, 0x9229);
pub const PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE: Tag = Tag(0x5200, 0x9230);
pub const PIXEL_DATA: Tag = Tag(0x7FE0, 0x0010);

// -----------------------------------------------------------------------------
// Sequence delimitation (not data elements)
// -----------------------------------------------------------------------------

pub const ITEM: Tag = Tag(0xFFFE, 0xE000);
pub const ITEM_DELIMITER: Tag = Tag(0xFFFE, 0xE00D);
pub const SEQUENCE_DELIMITER: Tag = Tag(0xFFFE, 0xE0DD);

/// Name of a tag for log and error messages.
///
/// Only the tags the pipeline itself emits are named; everything else prints
/// as `(gggg,eeee)`.
pub fn tag_name(tag: Tag) -> String {
    let name = match tag {
        TRANSFER_SYNTAX_UID => "TransferSyntaxUID",
        SOP_CLASS_UID => "SOPClassUID",
        SOP_INSTANCE_UID => "SOPInstanceUID",
        STUDY_INSTANCE_UID => "StudyInstanceUID",
        SERIES_INSTANCE_UID => "SeriesInstanceUID",
        NUMBER_OF_FRAMES => "NumberOfFrames",
        ROWS => "Rows",
        COLUMNS => "Columns",
        PHOTOMETRIC_INTERPRETATION => "PhotometricInterpretation",
        TOTAL_PIXEL_MATRIX_COLUMNS => "TotalPixelMatrixColumns",
        TOTAL_PIXEL_MATRIX_ROWS => "TotalPixelMatrixRows",
        PIXEL_DATA => "PixelData",
        _ => return tag.to_string(),
    };
    name.to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_display() {
        assert_eq!(PIXEL_DATA.to_string(), "(7FE0,0010)");
        assert_eq!(Tag(0x0008, 0x103E).to_string(), "(0008,103E)");
    }

    #[test]
    fn test_tag_from_hex() {
        assert_eq!(Tag::from_hex("00080018"), Some(SOP_INSTANCE_UID));
        assert_eq!(Tag::from_hex("7FE00010"), Some(PIXEL_DATA));
        assert_eq!(Tag::from_hex("0008"), None);
        assert_eq!(Tag::from_hex("0008001Z"), None);
    }

    #[test]
    fn test_tag_ordering_is_group_element() {
        assert!(SOP_CLASS_UID < STUDY_INSTANCE_UID);
        assert!(STUDY_INSTANCE_UID < PIXEL_DATA);
        assert!(ROWS < COLUMNS);
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name(ROWS), "Rows");
        assert_eq!(tag_name(Tag(0x0010, 0x0010)), "(0010,0010)");
    }
}
