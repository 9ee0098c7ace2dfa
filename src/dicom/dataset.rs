//! Ordered DICOM data-set assembly.
//!
//! Elements are kept sorted by tag (the part-10 stream requires ascending
//! tag order); inserting an existing tag replaces its value, which is how
//! caller-supplied JSON tags override core tags.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::tags::Tag;
use super::vr::Vr;

/// Value of a data element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Character-string VRs; multi-valued strings are joined with `\`.
    Str(String),
    U16(u16),
    U32(u32),
    I16(i16),
    I32(i32),
    F32(f32),
    F64(f64),
    /// Multi-valued 32-bit unsigned (UL with VM > 1).
    U32List(Vec<u32>),
    /// Attribute-tag VR (AT).
    TagRef(Tag),
    /// Opaque bytes (OB/OW with defined length).
    Bytes(Bytes),
    /// Sequence of items (SQ).
    Items(Vec<DataSet>),
    /// Encapsulated pixel data: one entry per fragment, excluding the
    /// leading Basic Offset Table item (always written empty).
    Fragments(Vec<Bytes>),
}

/// One data element: tag, VR, value.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub vr: Vr,
    pub value: Value,
}

/// An ordered collection of data elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    elements: BTreeMap<Tag, Element>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element, replacing any previous value for the tag.
    pub fn put(&mut self, tag: Tag, vr: Vr, value: Value) {
        self.elements.insert(tag, Element { tag, vr, value });
    }

    pub fn put_str(&mut self, tag: Tag, vr: Vr, value: impl Into<String>) {
        self.put(tag, vr, Value::Str(value.into()));
    }

    pub fn put_u16(&mut self, tag: Tag, value: u16) {
        self.put(tag, Vr::Us, Value::U16(value));
    }

    pub fn put_u32(&mut self, tag: Tag, value: u32) {
        self.put(tag, Vr::Ul, Value::U32(value));
    }

    pub fn put_u32_list(&mut self, tag: Tag, values: Vec<u32>) {
        self.put(tag, Vr::Ul, Value::U32List(values));
    }

    pub fn put_i32(&mut self, tag: Tag, value: i32) {
        self.put(tag, Vr::Sl, Value::I32(value));
    }

    pub fn put_f32(&mut self, tag: Tag, value: f32) {
        self.put(tag, Vr::Fl, Value::F32(value));
    }

    pub fn put_f64(&mut self, tag: Tag, value: f64) {
        self.put(tag, Vr::Fd, Value::F64(value));
    }

    pub fn put_tag_ref(&mut self, tag: Tag, value: Tag) {
        self.put(tag, Vr::At, Value::TagRef(value));
    }

    pub fn put_bytes(&mut self, tag: Tag, vr: Vr, value: Bytes) {
        self.put(tag, vr, Value::Bytes(value));
    }

    pub fn put_sequence(&mut self, tag: Tag, items: Vec<DataSet>) {
        self.put(tag, Vr::Sq, Value::Items(items));
    }

    pub fn put_fragments(&mut self, tag: Tag, fragments: Vec<Bytes>) {
        self.put(tag, Vr::Ob, Value::Fragments(fragments));
    }

    /// Merge every element of `other` into this set, overriding on conflict.
    pub fn merge(&mut self, other: &DataSet) {
        for element in other.iter() {
            self.elements.insert(element.tag, element.clone());
        }
    }

    /// Look up an element.
    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag)
    }

    /// String value of an element, when it has one.
    pub fn str_value(&self, tag: Tag) -> Option<&str> {
        match self.get(tag)?.value {
            Value::Str(ref s) => Some(s),
            _ => None,
        }
    }

    /// Integer view of an element (US/UL/SL/IS values).
    pub fn int_value(&self, tag: Tag) -> Option<i64> {
        match &self.get(tag)?.value {
            Value::U16(v) => Some(*v as i64),
            Value::U32(v) => Some(*v as i64),
            Value::I16(v) => Some(*v as i64),
            Value::I32(v) => Some(*v as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating-point view of an element (FL/FD/DS values).
    pub fn float_value(&self, tag: Tag) -> Option<f64> {
        match &self.get(tag)?.value {
            Value::F32(v) => Some(*v as f64),
            Value::F64(v) => Some(*v),
            Value::Str(s) => s.split('\\').next()?.trim().parse().ok(),
            _ => None,
        }
    }

    /// Items of a sequence element.
    pub fn items(&self, tag: Tag) -> Option<&[DataSet]> {
        match &self.get(tag)?.value {
            Value::Items(items) => Some(items),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }
}

// =============================================================================
// Tests
// =============================================================================
