//! DICOM part-10 parsing.
//!
//! Reads just enough of a WSI DICOM file to serve as a pyramid source:
//! the file meta group, the top-level dataset attributes, and the location
//! of every pixel-data fragment. Fragment payloads are not loaded here;
//! tile reads fetch them on demand through a range reader.

use bytes::Bytes;

use crate::error::DicomError;
use crate::io::RangeReader;

use super::dataset::DataSet;
use super::tags::{self, Tag};
use super::vr::Vr;
use super::{TS_EXPLICIT_VR_LE, TS_IMPLICIT_VR_LE, TS_JPEG2000_LOSSLESS, TS_JPEG_BASELINE};

/// Undefined length marker.
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Values longer than this are not retained in the parsed dataset.
const MAX_RETAINED_VALUE: u32 = 64 * 1024;

/// Where a file keeps its pixel payload.
#[derive(Debug, Clone, Default)]
pub struct PixelDataLocation {
    /// Per-fragment (offset, length), excluding the Basic Offset Table item.
    pub fragments: Vec<(u64, u64)>,

    /// (offset, length) of native (unencapsulated) pixel data.
    pub flat: Option<(u64, u64)>,
}

/// A parsed WSI DICOM file: top-level attributes plus pixel-data geometry.
#[derive(Debug, Clone)]
pub struct DicomFile {
    pub dataset: DataSet,
    pub transfer_syntax: String,
    pub pixel_data: PixelDataLocation,
}

impl DicomFile {
    /// Parse the structure of a part-10 file.
    pub fn parse<R: RangeReader>(reader: &R) -> Result<Self, DicomError> {
        if reader.size() < 132 {
            return Err(DicomError::NotDicom);
        }
        let prefix = reader
            .read_exact_at(128, 4)
            .map_err(|e| DicomError::InvalidFileMeta(e.to_string()))?;
        if &prefix[..] != b"DICM" {
            return Err(DicomError::NotDicom);
        }

        let mut cursor = Cursor {
            reader,
            offset: 132,
        };

        let transfer_syntax = parse_file_meta(&mut cursor)?;
        let explicit_vr = match transfer_syntax.as_str() {
            TS_IMPLICIT_VR_LE => false,
            TS_EXPLICIT_VR_LE | TS_JPEG_BASELINE | TS_JPEG2000_LOSSLESS => true,
            other => return Err(DicomError::UnsupportedTransferSyntax(other.to_string())),
        };

        let mut dataset = DataSet::new();
        let mut pixel_data = PixelDataLocation::default();
        while cursor.offset < cursor.reader.size() {
            let header = read_header(&mut cursor, explicit_vr)?;
            if header.tag == tags::PIXEL_DATA {
                if header.length == UNDEFINED_LENGTH {
                    pixel_data.fragments = read_fragment_index(&mut cursor)?;
                } else {
                    pixel_data.flat = Some((cursor.offset, header.length as u64));
                    cursor.offset += header.length as u64;
                }
                continue;
            }
            consume_value(&mut cursor, &header, &mut dataset)?;
        }

        Ok(DicomFile {
            dataset,
            transfer_syntax,
            pixel_data,
        })
    }

    /// Number of frames, defaulting to 1 when absent.
    pub fn number_of_frames(&self) -> u32 {
        self.dataset
            .int_value(tags::NUMBER_OF_FRAMES)
            .unwrap_or(1)
            .max(1) as u32
    }

    /// Required unsigned value, as a typed error when missing.
    pub fn required_u32(&self, tag: Tag, name: &'static str) -> Result<u32, DicomError> {
        self.dataset
            .int_value(tag)
            .filter(|v| *v >= 0)
            .map(|v| v as u32)
            .ok_or(DicomError::MissingTag(name))
    }
}

// =============================================================================
// Parsing internals
// =============================================================================

struct Cursor<'a, R: RangeReader> {
    reader: &'a R,
    offset: u64,
}

impl<R: RangeReader> Cursor<'_, R> {
    fn read(&mut self, len: usize) -> Result<Bytes, DicomError> {
        let bytes = self
            .reader
            .read_exact_at(self.offset, len)
            .map_err(|e| DicomError::Dataset(e.to_string()))?;
        self.offset += len as u64;
        Ok(bytes)
    }
}

struct ElementHeader {
    tag: Tag,
    vr: Vr,
    length: u32,
}

fn read_tag<R: RangeReader>(cursor: &mut Cursor<R>) -> Result<Tag, DicomError> {
    let bytes = cursor.read(4)?;
    Ok(Tag(
        u16::from_le_bytes([bytes[0], bytes[1]]),
        u16::from_le_bytes([bytes[2], bytes[3]]),
    ))
}

fn read_header<R: RangeReader>(
    cursor: &mut Cursor<R>,
    explicit_vr: bool,
) -> Result<ElementHeader, DicomError> {
    let tag = read_tag(cursor)?;
    if !explicit_vr {
        let bytes = cursor.read(4)?;
        let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        return Ok(ElementHeader {
            tag,
            vr: implicit_vr(tag),
            length,
        });
    }

    let vr_bytes = cursor.read(2)?;
    let vr = Vr::from_code(&[vr_bytes[0], vr_bytes[1]]).unwrap_or(Vr::Un);
    let length = if vr.has_long_length() {
        cursor.read(2)?; // reserved
        let bytes = cursor.read(4)?;
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    } else {
        let bytes = cursor.read(2)?;
        u16::from_le_bytes([bytes[0], bytes[1]]) as u32
    };
    Ok(ElementHeader { tag, vr, length })
}

/// VRs for the tags the source layer needs when a file is implicit VR.
fn implicit_vr(tag: Tag) -> Vr {
    match tag {
        tags::ROWS
        | tags::COLUMNS
        | tags::SAMPLES_PER_PIXEL
        | tags::PLANAR_CONFIGURATION
        | tags::BITS_ALLOCATED
        | tags::BITS_STORED
        | tags::HIGH_BIT
        | tags::PIXEL_REPRESENTATION => Vr::Us,
        tags::TOTAL_PIXEL_MATRIX_COLUMNS | tags::TOTAL_PIXEL_MATRIX_ROWS => Vr::Ul,
        tags::NUMBER_OF_FRAMES => Vr::Is,
        tags::SOP_CLASS_UID
        | tags::SOP_INSTANCE_UID
        | tags::STUDY_INSTANCE_UID
        | tags::SERIES_INSTANCE_UID
        | tags::FRAME_OF_REFERENCE_UID => Vr::Ui,
        tags::MODALITY | tags::PHOTOMETRIC_INTERPRETATION | tags::LOSSY_IMAGE_COMPRESSION => {
            Vr::Cs
        }
        tags::IMAGED_VOLUME_WIDTH | tags::IMAGED_VOLUME_HEIGHT => Vr::Fl,
        tags::SHARED_FUNCTIONAL_GROUPS_SEQUENCE
        | tags::PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE
        | tags::DIMENSION_ORGANIZATION_SEQUENCE
        | tags::DIMENSION_INDEX_SEQUENCE => Vr::Sq,
        _ => Vr::Un,
    }
}

/// Read the file meta group; returns the transfer syntax UID.
fn parse_file_meta<R: RangeReader>(cursor: &mut Cursor<R>) -> Result<String, DicomError> {
    let header = read_header(cursor, true)?;
    if header.tag != tags::FILE_META_GROUP_LENGTH || header.length != 4 {
        return Err(DicomError::InvalidFileMeta(
            "missing file meta group length".to_string(),
        ));
    }
    let bytes = cursor.read(4)?;
    let group_length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
    let group_end = cursor.offset + group_length;

    let mut transfer_syntax = None;
    while cursor.offset < group_end {
        let header = read_header(cursor, true)?;
        let value = cursor.read(header.length as usize)?;
        if header.tag == tags::TRANSFER_SYNTAX_UID {
            transfer_syntax = Some(trim_string(&value));
        }
    }
    transfer_syntax.ok_or(DicomError::InvalidFileMeta(
        "missing transfer syntax".to_string(),
    ))
}

fn trim_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .to_string()
}

/// Store or skip one element's value.
fn consume_value<R: RangeReader>(
    cursor: &mut Cursor<R>,
    header: &ElementHeader,
    dataset: &mut DataSet,
) -> Result<(), DicomError> {
    // Sequences are skipped wholesale: the source layer only consumes
    // top-level attributes.
    if header.vr == Vr::Sq || header.length == UNDEFINED_LENGTH {
        skip_sequence(cursor, header.length)?;
        return Ok(());
    }

    if header.length > MAX_RETAINED_VALUE {
        cursor.offset += header.length as u64;
        return Ok(());
    }

    let value = cursor.read(header.length as usize)?;
    if header.vr.is_string() {
        dataset.put_str(header.tag, header.vr, trim_string(&value));
    } else {
        match (header.vr, header.length) {
            (Vr::Us, 2) => dataset.put_u16(header.tag, u16::from_le_bytes([value[0], value[1]])),
            (Vr::Ul, 4) => dataset.put_u32(
                header.tag,
                u32::from_le_bytes([value[0], value[1], value[2], value[3]]),
            ),
            (Vr::Sl, 4) => dataset.put_i32(
                header.tag,
                i32::from_le_bytes([value[0], value[1], value[2], value[3]]),
            ),
            (Vr::Fl, 4) => dataset.put_f32(
                header.tag,
                f32::from_le_bytes([value[0], value[1], value[2], value[3]]),
            ),
            _ => dataset.put_bytes(header.tag, header.vr, value),
        }
    }
    Ok(())
}

/// Skip a sequence value (defined or undefined length).
fn skip_sequence<R: RangeReader>(cursor: &mut Cursor<R>, length: u32) -> Result<(), DicomError> {
    if length != UNDEFINED_LENGTH {
        cursor.offset += length as u64;
        return Ok(());
    }
    loop {
        let tag = read_tag(cursor)?;
        let bytes = cursor.read(4)?;
        let item_length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        match tag {
            tags::SEQUENCE_DELIMITER => return Ok(()),
            tags::ITEM => {
                if item_length == UNDEFINED_LENGTH {
                    skip_item(cursor)?;
                } else {
                    cursor.offset += item_length as u64;
                }
            }
            other => {
                return Err(DicomError::Dataset(format!(
                    "unexpected tag {other} inside sequence"
                )))
            }
        }
    }
}

/// Skip an undefined-length item by walking its elements.
fn skip_item<R: RangeReader>(cursor: &mut Cursor<R>) -> Result<(), DicomError> {
    loop {
        let tag = read_tag(cursor)?;
        if tag == tags::ITEM_DELIMITER {
            cursor.read(4)?;
            return Ok(());
        }
        // Nested element: assume explicit VR inside items, matching the
        // writer; implicit-VR files with nested sequences are not produced
        // by scanners this reader targets.
        cursor.offset -= 4;
        let header = read_header(cursor, true)?;
        if header.vr == Vr::Sq || header.length == UNDEFINED_LENGTH {
            skip_sequence(cursor, header.length)?;
        } else {
            cursor.offset += header.length as u64;
        }
    }
}

/// Index encapsulated pixel-data fragments.
///
/// The first item is the Basic Offset Table; it is consumed but not
/// returned as a fragment.
fn read_fragment_index<R: RangeReader>(
    cursor: &mut Cursor<R>,
) -> Result<Vec<(u64, u64)>, DicomError> {
    let mut fragments = Vec::new();
    let mut first = true;
    loop {
        let tag = read_tag(cursor)?;
        let bytes = cursor.read(4)?;
        let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        match tag {
            tags::SEQUENCE_DELIMITER => return Ok(fragments),
            tags::ITEM => {
                if !first {
                    fragments.push((cursor.offset, length as u64));
                }
                first = false;
                cursor.offset += length as u64;
            }
            other => {
                return Err(DicomError::Dataset(format!(
                    "unexpected tag {other} in pixel data"
                )))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
