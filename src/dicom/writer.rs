//! DICOM part-10 serialization.
//!
//! Datasets are written in explicit VR little endian. Encapsulated pixel
//! data is emitted as an undefined-length element whose first item is an
//! empty Basic Offset Table, followed by one item per frame. The leading
//! empty offset table is a hard format requirement.

use std::fs;
use std::path::Path;

use bytes::Bytes;

use crate::error::DicomError;

use super::dataset::{DataSet, Element, Value};
use super::tags::{self, Tag};
use super::vr::Vr;

/// Undefined length marker.
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// File meta information for one instance.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
    pub transfer_syntax: String,
}

/// Implementation class UID written to file meta.
const IMPLEMENTATION_CLASS_UID: &str = "2.25.304277383419289245233536294402044305520";

fn implementation_version() -> String {
    format!("wsi-dicomizer {}", env!("CARGO_PKG_VERSION"))
}

// =============================================================================
// Element encoding
// =============================================================================

fn push_tag(out: &mut Vec<u8>, tag: Tag) {
    out.extend_from_slice(&tag.group().to_le_bytes());
    out.extend_from_slice(&tag.element().to_le_bytes());
}

/// Encode a primitive value to its on-stream bytes (unpadded).
fn encode_value(element: &Element) -> Result<Vec<u8>, DicomError> {
    let bytes = match &element.value {
        Value::Str(s) => s.as_bytes().to_vec(),
        Value::U16(v) => v.to_le_bytes().to_vec(),
        Value::U32(v) => v.to_le_bytes().to_vec(),
        Value::U32List(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        Value::I16(v) => v.to_le_bytes().to_vec(),
        Value::I32(v) => v.to_le_bytes().to_vec(),
        Value::F32(v) => v.to_le_bytes().to_vec(),
        Value::F64(v) => v.to_le_bytes().to_vec(),
        Value::TagRef(t) => {
            let mut b = Vec::with_capacity(4);
            b.extend_from_slice(&t.group().to_le_bytes());
            b.extend_from_slice(&t.element().to_le_bytes());
            b
        }
        Value::Bytes(b) => b.to_vec(),
        Value::Items(_) | Value::Fragments(_) => {
            return Err(DicomError::Dataset(format!(
                "{} is not a primitive element",
                element.tag
            )))
        }
    };
    Ok(bytes)
}

fn write_header(out: &mut Vec<u8>, tag: Tag, vr: Vr, length: u32) {
    push_tag(out, tag);
    out.extend_from_slice(vr.code());
    if vr.has_long_length() {
        out.extend_from_slice(&[0u8, 0u8]);
        out.extend_from_slice(&length.to_le_bytes());
    } else {
        out.extend_from_slice(&(length as u16).to_le_bytes());
    }
}

fn write_element(out: &mut Vec<u8>, element: &Element) -> Result<(), DicomError> {
    match &element.value {
        Value::Items(items) => {
            write_header(out, element.tag, Vr::Sq, UNDEFINED_LENGTH);
            for item in items {
                push_tag(out, tags::ITEM);
                out.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
                write_dataset(out, item)?;
                push_tag(out, tags::ITEM_DELIMITER);
                out.extend_from_slice(&0u32.to_le_bytes());
            }
            push_tag(out, tags::SEQUENCE_DELIMITER);
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        Value::Fragments(fragments) => {
            write_header(out, element.tag, Vr::Ob, UNDEFINED_LENGTH);
            // Empty Basic Offset Table item comes first.
            push_tag(out, tags::ITEM);
            out.extend_from_slice(&0u32.to_le_bytes());
            for fragment in fragments {
                write_fragment(out, fragment);
            }
            push_tag(out, tags::SEQUENCE_DELIMITER);
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        _ => {
            let mut bytes = encode_value(element)?;
            if bytes.len() % 2 == 1 {
                bytes.push(element.vr.padding());
            }
            if bytes.len() > u32::MAX as usize {
                return Err(DicomError::Dataset(format!(
                    "value of {} exceeds the 32-bit length limit",
                    element.tag
                )));
            }
            if !element.vr.has_long_length() && bytes.len() > u16::MAX as usize {
                return Err(DicomError::Dataset(format!(
                    "value of {} exceeds the 16-bit length limit",
                    element.tag
                )));
            }
            write_header(out, element.tag, element.vr, bytes.len() as u32);
            out.extend_from_slice(&bytes);
        }
    }
    Ok(())
}

fn write_fragment(out: &mut Vec<u8>, fragment: &Bytes) {
    push_tag(out, tags::ITEM);
    let padded = fragment.len() + fragment.len() % 2;
    out.extend_from_slice(&(padded as u32).to_le_bytes());
    out.extend_from_slice(fragment);
    if fragment.len() % 2 == 1 {
        out.push(0);
    }
}

/// Serialize a dataset in explicit VR little endian, ascending tag order.
pub fn write_dataset(out: &mut Vec<u8>, dataset: &DataSet) -> Result<(), DicomError> {
    for element in dataset.iter() {
        write_element(out, element)?;
    }
    Ok(())
}

// =============================================================================
// File meta and part-10 files
// =============================================================================

/// Serialize the file meta information group (always explicit VR LE).
fn write_file_meta(out: &mut Vec<u8>, meta: &FileMeta) -> Result<(), DicomError> {
    let mut group = DataSet::new();
    group.put_bytes(
        tags::FILE_META_VERSION,
        Vr::Ob,
        Bytes::from_static(&[0x00, 0x01]),
    );
    group.put_str(tags::MEDIA_STORAGE_SOP_CLASS_UID, Vr::Ui, &meta.sop_class_uid);
    group.put_str(
        tags::MEDIA_STORAGE_SOP_INSTANCE_UID,
        Vr::Ui,
        &meta.sop_instance_uid,
    );
    group.put_str(tags::TRANSFER_SYNTAX_UID, Vr::Ui, &meta.transfer_syntax);
    group.put_str(
        tags::IMPLEMENTATION_CLASS_UID,
        Vr::Ui,
        IMPLEMENTATION_CLASS_UID,
    );
    group.put_str(
        tags::IMPLEMENTATION_VERSION_NAME,
        Vr::Sh,
        implementation_version(),
    );

    let mut body = Vec::new();
    write_dataset(&mut body, &group)?;

    // Group length counts every byte after its own element.
    let mut length_element = Vec::new();
    write_header(&mut length_element, tags::FILE_META_GROUP_LENGTH, Vr::Ul, 4);
    length_element.extend_from_slice(&(body.len() as u32).to_le_bytes());

    out.extend_from_slice(&length_element);
    out.extend_from_slice(&body);
    Ok(())
}

/// Serialize a complete part-10 file to bytes.
pub fn serialize_file(meta: &FileMeta, dataset: &DataSet) -> Result<Vec<u8>, DicomError> {
    let mut out = Vec::new();
    out.resize(128, 0u8);
    out.extend_from_slice(b"DICM");
    write_file_meta(&mut out, meta)?;
    write_dataset(&mut out, dataset)?;
    Ok(out)
}

/// Write a complete part-10 file to disk.
pub fn write_file<P: AsRef<Path>>(
    path: P,
    meta: &FileMeta,
    dataset: &DataSet,
) -> Result<(), DicomError> {
    let bytes = serialize_file(meta, dataset)?;
    fs::write(path.as_ref(), bytes)
        .map_err(|e| DicomError::Dataset(format!("write {}: {e}", path.as_ref().display())))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> FileMeta {
        FileMeta {
            sop_class_uid: "1.2.840.10008.5.1.4.1.1.77.1.6".to_string(),
            sop_instance_uid: "2.25.1".to_string(),
            transfer_syntax: "1.2.840.10008.1.2.1".to_string(),
        }
    }

    #[test]
    fn test_short_string_element() {
        let mut ds = DataSet::new();
        ds.put_str(tags::MODALITY, Vr::Cs, "SM");
        let mut out = Vec::new();
        write_dataset(&mut out, &ds).unwrap();

        // tag (0008,0060), "CS", length 2, "SM"
        assert_eq!(
            out,
            vec![0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'S', b'M']
        );
    }

    #[test]
    fn test_odd_string_padded() {
        let mut ds = DataSet::new();
        ds.put_str(tags::SOP_INSTANCE_UID, Vr::Ui, "1.2.3");
        let mut out = Vec::new();
        write_dataset(&mut out, &ds).unwrap();
        // 5-char UID padded with NUL to 6
        assert_eq!(out[6], 6);
        assert_eq!(*out.last().unwrap(), 0x00);
    }

    #[test]
    fn test_us_element() {
        let mut ds = DataSet::new();
        ds.put_u16(tags::ROWS, 500);
        let mut out = Vec::new();
        write_dataset(&mut out, &ds).unwrap();
        assert_eq!(
            out,
            vec![0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0xF4, 0x01]
        );
    }

    #[test]
    fn test_long_form_header() {
        let mut ds = DataSet::new();
        ds.put_bytes(tags::PIXEL_DATA, Vr::Ob, Bytes::from_static(&[1, 2, 3, 4]));
        let mut out = Vec::new();
        write_dataset(&mut out, &ds).unwrap();
        // tag + "OB" + 2 reserved + u32 length + payload
        assert_eq!(out.len(), 4 + 2 + 2 + 4 + 4);
        assert_eq!(&out[4..6], b"OB");
        assert_eq!(&out[6..8], &[0, 0]);
        assert_eq!(u32::from_le_bytes([out[8], out[9], out[10], out[11]]), 4);
    }

    #[test]
    fn test_encapsulated_pixel_data_layout() {
        let mut ds = DataSet::new();
        ds.put_fragments(tags::PIXEL_DATA, vec![Bytes::from_static(&[0xAB, 0xCD, 0xEF])]);
        let mut out = Vec::new();
        write_dataset(&mut out, &ds).unwrap();

        // Header: tag + OB + reserved + undefined length
        assert_eq!(&out[..4], &[0xE0, 0x7F, 0x10, 0x00]);
        assert_eq!(&out[4..6], b"OB");
        assert_eq!(&out[8..12], &0xFFFF_FFFFu32.to_le_bytes());
        // First item: empty Basic Offset Table
        assert_eq!(&out[12..16], &[0xFE, 0xFF, 0x00, 0xE0]);
        assert_eq!(&out[16..20], &0u32.to_le_bytes());
        // Fragment item, padded to even length
        assert_eq!(&out[20..24], &[0xFE, 0xFF, 0x00, 0xE0]);
        assert_eq!(u32::from_le_bytes([out[24], out[25], out[26], out[27]]), 4);
        assert_eq!(&out[28..32], &[0xAB, 0xCD, 0xEF, 0x00]);
        // Sequence delimiter
        assert_eq!(&out[32..36], &[0xFE, 0xFF, 0xDD, 0xE0]);
        assert_eq!(&out[36..40], &0u32.to_le_bytes());
    }

    #[test]
    fn test_sequence_layout() {
        let mut item = DataSet::new();
        item.put_u16(tags::ROWS, 1);
        let mut ds = DataSet::new();
        ds.put_sequence(tags::PIXEL_MEASURES_SEQUENCE, vec![item]);

        let mut out = Vec::new();
        write_dataset(&mut out, &ds).unwrap();

        assert_eq!(&out[4..6], b"SQ");
        assert_eq!(&out[8..12], &0xFFFF_FFFFu32.to_le_bytes());
        // Item start with undefined length
        assert_eq!(&out[12..16], &[0xFE, 0xFF, 0x00, 0xE0]);
        assert_eq!(&out[16..20], &0xFFFF_FFFFu32.to_le_bytes());
        // Ends with item delimiter + sequence delimiter
        let n = out.len();
        assert_eq!(&out[n - 16..n - 12], &[0xFE, 0xFF, 0x0D, 0xE0]);
        assert_eq!(&out[n - 8..n - 4], &[0xFE, 0xFF, 0xDD, 0xE0]);
    }

    #[test]
    fn test_file_layout() {
        let mut ds = DataSet::new();
        ds.put_str(tags::MODALITY, Vr::Cs, "SM");
        let bytes = serialize_file(&meta(), &ds).unwrap();

        assert!(bytes.len() > 132);
        assert!(bytes[..128].iter().all(|&b| b == 0));
        assert_eq!(&bytes[128..132], b"DICM");
        // Group length element comes first in the meta group.
        assert_eq!(&bytes[132..136], &[0x02, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_file_meta_group_length_spans_group() {
        let ds = DataSet::new();
        let bytes = serialize_file(&meta(), &ds).unwrap();
        let group_length =
            u32::from_le_bytes([bytes[140], bytes[141], bytes[142], bytes[143]]) as usize;
        // Everything after the group length element must be exactly that long
        // (no dataset elements follow the meta group here).
        assert_eq!(bytes.len(), 144 + group_length);
    }
}
