//! I/O layer: positioned byte-range reads over local files.

mod file;

pub use file::{
    read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le, FileRangeReader,
    RangeReader,
};
