//! Additional tags from a DICOM JSON model file.
//!
//! The accepted shape is the DICOM JSON model subset the converter's users
//! feed it: an object keyed by eight-hex-digit tags, each value carrying a
//! `vr` string and a `Value` array. Parsed elements are merged into each
//! instance dataset after the core tags, overriding them.
//!
//! Unknown VRs are skipped with a warning; a malformed file is a warning
//! too, never fatal.

use serde_json::Value as Json;
use tracing::warn;

use crate::error::DicomError;

use super::dataset::DataSet;
use super::tags::Tag;
use super::vr::Vr;

/// Parse a DICOM JSON model document into a dataset.
pub fn parse_json_tags(json_text: &str) -> Result<DataSet, DicomError> {
    let root: Json = serde_json::from_str(json_text)
        .map_err(|e| DicomError::Dataset(format!("can't parse JSON: {e}")))?;
    let object = root
        .as_object()
        .ok_or_else(|| DicomError::Dataset("JSON root is not an object".to_string()))?;

    let mut dataset = DataSet::new();
    for (key, node) in object {
        let Some(tag) = Tag::from_hex(key) else {
            warn!("skipping JSON key {key:?}: not an eight-digit hex tag");
            continue;
        };
        parse_one(tag, node, &mut dataset);
    }
    Ok(dataset)
}

fn parse_one(tag: Tag, node: &Json, dataset: &mut DataSet) {
    let vr_name = node.get("vr").and_then(Json::as_str).unwrap_or("");
    let vr_code: [u8; 2] = match vr_name.as_bytes().try_into() {
        Ok(code) => code,
        Err(_) => {
            warn!("skipping tag {tag}: missing vr");
            return;
        }
    };
    let Some(vr) = Vr::from_code(&vr_code) else {
        warn!("unknown tag vr {vr_name}");
        return;
    };

    let values = node.get("Value").and_then(Json::as_array);
    let first = values.and_then(|v| v.first());

    if vr.is_string() {
        let Some(values) = values else {
            // Type-2 style empty element.
            dataset.put_str(tag, vr, "");
            return;
        };
        let joined = values
            .iter()
            .map(scalar_as_string)
            .collect::<Vec<_>>()
            .join("\\");
        dataset.put_str(tag, vr, joined);
        return;
    }

    let Some(first) = first else {
        warn!("skipping tag {tag}: no value");
        return;
    };

    match vr {
        Vr::Sl => {
            if let Some(v) = first.as_i64() {
                dataset.put_i32(tag, v as i32);
            }
        }
        Vr::Ss => {
            if let Some(v) = first.as_i64() {
                dataset.put(tag, Vr::Ss, super::dataset::Value::I16(v as i16));
            }
        }
        Vr::Ul => {
            if let Some(v) = first.as_u64() {
                dataset.put_u32(tag, v as u32);
            }
        }
        Vr::Us => {
            if let Some(v) = first.as_u64() {
                dataset.put_u16(tag, v as u16);
            }
        }
        Vr::Fl => {
            if let Some(v) = first.as_f64() {
                dataset.put_f32(tag, v as f32);
            }
        }
        Vr::Fd => {
            if let Some(v) = first.as_f64() {
                dataset.put_f64(tag, v);
            }
        }
        Vr::At => {
            if let Some(target) = first.as_str().and_then(Tag::from_hex) {
                dataset.put_tag_ref(tag, target);
            } else {
                warn!("skipping tag {tag}: AT value is not a tag");
            }
        }
        Vr::Sq => {
            let mut items = Vec::new();
            if let Some(values) = values {
                for item_node in values {
                    if let Some(object) = item_node.as_object() {
                        let mut item = DataSet::new();
                        for (key, child) in object {
                            if let Some(child_tag) = Tag::from_hex(key) {
                                parse_one(child_tag, child, &mut item);
                            }
                        }
                        items.push(item);
                    }
                }
            }
            dataset.put_sequence(tag, items);
        }
        other => {
            warn!("unknown tag vr {:?}", other);
        }
    }
}

fn scalar_as_string(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================
