use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while interpreting configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Input file does not exist or is not readable
    #[error("can't access {0}")]
    InputNotFound(PathBuf),

    /// Output directory does not exist
    #[error("output folder does not exist: {0}")]
    OutputNotFound(PathBuf),

    /// Compression name is not one of jpeg / jpeg2000 / raw / none
    #[error("can't find compression: {0}")]
    UnknownCompression(String),

    /// An option value is outside its valid range
    #[error("invalid value for {option}: {message}")]
    InvalidOption {
        option: &'static str,
        message: String,
    },
}

/// Errors that can occur when parsing TIFF files.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// Invalid TIFF magic bytes (not II or MM)
    #[error("invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF structure
    #[error("file too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside the file)
    #[error("invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from an IFD
    #[error("missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("unsupported compression: {0}")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles
    #[error("unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// Unknown field type in an IFD entry
    #[error("unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised by the pixel codecs.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Encoder refused the input
    #[error("encoder error: {0}")]
    Encode(String),

    /// Decoder could not reconstruct pixels
    #[error("decode error: {0}")]
    Decode(String),

    /// Decoded output does not match the expected dimensions
    #[error("decoded size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Errors raised by the DICOM read/write layer.
#[derive(Debug, Clone, Error)]
pub enum DicomError {
    /// Stream does not start with a part-10 preamble and "DICM" marker
    #[error("not a DICOM part-10 file")]
    NotDicom,

    /// File meta information group is malformed
    #[error("invalid file meta information: {0}")]
    InvalidFileMeta(String),

    /// A required tag is missing from the dataset
    #[error("missing required tag: {0}")]
    MissingTag(&'static str),

    /// A tag value could not be interpreted
    #[error("invalid value for tag {tag}: {message}")]
    InvalidValue { tag: String, message: String },

    /// Transfer syntax is not one the pipeline understands
    #[error("unsupported transfer syntax: {0}")]
    UnsupportedTransferSyntax(String),

    /// Structural error while assembling or serializing a dataset
    #[error("dataset error: {0}")]
    Dataset(String),
}

/// Errors raised while opening or reading a pyramid source.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Source could not be opened or parsed at all
    #[error("invalid source: {0}")]
    Open(String),

    /// A region or tile read failed mid-conversion
    #[error("source read failed: {0}")]
    Read(String),

    /// TIFF structure error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// DICOM structure error
    #[error("DICOM error: {0}")]
    Dicom(#[from] DicomError),

    /// Tile decode error
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Underlying file I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err.to_string())
    }
}

/// Top-level error for a conversion job.
///
/// Nothing is retried: the first fatal error aborts the job after in-flight
/// worker tasks drain. Files already written stay on disk for diagnosis.
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Dicom(#[from] DicomError),

    /// File write failed; partial output is preserved
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io(err.to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
