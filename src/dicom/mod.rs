//! DICOM data-set assembly, part-10 serialization, and part-10 parsing.
//!
//! The converter emits standard DICOM files and can read an existing WSI
//! DICOM file back as a pyramid source, so both directions live here. The
//! layer is deliberately scoped to what the pipeline needs: explicit and
//! implicit VR little endian, encapsulated pixel data, and the WSI tag set.

mod dataset;
mod json_tags;
mod reader;
pub mod tags;
mod uid;
mod vr;
mod writer;

pub use dataset::{DataSet, Element, Value};
pub use json_tags::parse_json_tags;
pub use reader::{DicomFile, PixelDataLocation};
pub use tags::{tag_name, Tag};
pub use uid::{derive_uid, generate_uid};
pub use vr::Vr;
pub use writer::{serialize_file, write_file, FileMeta};

/// SOP class UID: VL Whole Slide Microscopy Image Storage.
pub const SOP_CLASS_WSI: &str = "1.2.840.10008.5.1.4.1.1.77.1.6";

/// Transfer syntax UID: Explicit VR Little Endian.
pub const TS_EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

/// Transfer syntax UID: Implicit VR Little Endian.
pub const TS_IMPLICIT_VR_LE: &str = "1.2.840.10008.1.2";

/// Transfer syntax UID: JPEG baseline (process 1).
pub const TS_JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

/// Transfer syntax UID: JPEG 2000 lossless only.
pub const TS_JPEG2000_LOSSLESS: &str = "1.2.840.10008.1.2.4.90";
