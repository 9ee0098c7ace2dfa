//! Output frames: one tile at one pyramid level.
//!
//! A frame is created Pending when the scheduler enqueues its tile, becomes
//! Encoded when its worker finishes `slice()` (read, resample, encode), and
//! Emitted when an instance builder takes the encoded payload. Frames whose
//! level feeds the next level also keep a deflate-compressed copy of their
//! raw pixels; planned read leases release it as soon as the last consumer
//! is done.

mod bilinear;
mod filtered;
mod nearest;

pub use bilinear::resample_bilinear;
pub use filtered::{resample_filtered, FilterKernel};
pub use nearest::resample_nearest;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};

use crate::codec::{compress_bytes, decompress_bytes, Codec};
use crate::error::{CodecError, ConvertError, SourceError};
use crate::pixels::{PixelBuffer, BYTES_PER_PIXEL};
use crate::pyramid::RegionReader;
use crate::source::PyramidSource;

// =============================================================================
// Pixel supply
// =============================================================================

/// Where a frame's pixels come from.
///
/// Either the input pyramid at a chosen base level, or the previous output
/// level served through a region reader (progressive downsampling).
#[derive(Clone, Copy)]
pub enum PixelSupply<'a> {
    Source {
        source: &'a dyn PyramidSource,
        level: usize,
    },
    Previous(&'a RegionReader),
}

impl PixelSupply<'_> {
    /// Read a rectangle from the supply, padding outside pixels with zeros.
    pub fn read_region(
        &self,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<PixelBuffer, SourceError> {
        match self {
            PixelSupply::Source { source, level } => {
                source.read_region(*level, x, y, width, height)
            }
            PixelSupply::Previous(region) => region
                .read_region(x, y, width, height)
                .map_err(|e| SourceError::Read(e.to_string())),
        }
    }

    /// Dimensions of the supplying level.
    pub fn dimensions(&self) -> (i64, i64) {
        match self {
            PixelSupply::Source { source, level } => {
                let (w, h) = source.level_dimensions(*level).unwrap_or((0, 0));
                (w as i64, h as i64)
            }
            PixelSupply::Previous(region) => region.image_dimensions(),
        }
    }
}

// =============================================================================
// Resampler selection
// =============================================================================

/// Resampling kernel a frame uses in `slice()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resampler {
    /// Nearest-neighbor resize of the fetched rectangle.
    Nearest,
    /// Area-weighted bilinear scatter (reads a margin around the rectangle).
    Bilinear,
    /// Configurable filter kernel with a clipped padding margin.
    Filtered(FilterKernel),
}

// =============================================================================
// Frame
// =============================================================================

/// Lifecycle state of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameState {
    Pending,
    Encoded,
    Emitted,
    Failed(String),
}

struct FrameInner {
    state: FrameState,
    encoded: Option<Bytes>,
    /// Deflate-compressed raw RGBA pixels, kept while readers are planned.
    raw_cache: Option<Bytes>,
    read_counter: i64,
}

/// One output tile at one output level.
pub struct Frame {
    /// Top-left corner in the pixel supply's coordinate space.
    location_x: i64,
    location_y: i64,
    /// Rectangle consumed from the supply.
    read_width: i64,
    read_height: i64,
    /// Emitted tile dimensions.
    frame_width: u32,
    frame_height: u32,
    /// Output level dimensions (bilinear/filtered kernels project into them).
    target_level_width: i64,
    target_level_height: i64,
    resampler: Resampler,
    codec: Codec,
    quality: u8,
    /// Keep raw pixels for the next level's region reader.
    store_raw: bool,
    photometric: String,
    inner: Mutex<FrameInner>,
    completed: Condvar,
}

impl Frame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        location_x: i64,
        location_y: i64,
        read_width: i64,
        read_height: i64,
        frame_width: u32,
        frame_height: u32,
        target_level_width: i64,
        target_level_height: i64,
        resampler: Resampler,
        codec: Codec,
        quality: u8,
        store_raw: bool,
        photometric: impl Into<String>,
    ) -> Self {
        Self {
            location_x,
            location_y,
            read_width,
            read_height,
            frame_width,
            frame_height,
            target_level_width,
            target_level_height,
            resampler,
            codec,
            quality,
            store_raw,
            photometric: photometric.into(),
            inner: Mutex::new(FrameInner {
                state: FrameState::Pending,
                encoded: None,
                raw_cache: None,
                read_counter: 0,
            }),
            completed: Condvar::new(),
        }
    }

    pub fn location_x(&self) -> i64 {
        self.location_x
    }

    pub fn location_y(&self) -> i64 {
        self.location_y
    }

    pub fn read_width(&self) -> i64 {
        self.read_width
    }

    pub fn read_height(&self) -> i64 {
        self.read_height
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    pub fn photometric(&self) -> &str {
        &self.photometric
    }

    pub fn state(&self) -> FrameState {
        self.inner.lock().state.clone()
    }

    /// Size in bytes of the uncompressed raw RGBA cache.
    fn raw_len(&self) -> usize {
        self.frame_width as usize * self.frame_height as usize * BYTES_PER_PIXEL
    }

    /// Read, resample, and encode this tile.
    ///
    /// Stores the encoded payload (and the raw cache when the level feeds
    /// the next one), flips the state to Encoded, and wakes waiting
    /// builders. A failure is recorded in the state so waiting builders
    /// fail too instead of blocking forever.
    pub fn slice(&self, supply: &PixelSupply<'_>) -> Result<(), ConvertError> {
        match self.slice_impl(supply) {
            Ok(()) => Ok(()),
            Err(err) => {
                let mut inner = self.inner.lock();
                inner.state = FrameState::Failed(err.to_string());
                self.completed.notify_all();
                Err(err)
            }
        }
    }

    fn slice_impl(&self, supply: &PixelSupply<'_>) -> Result<(), ConvertError> {
        let tile = match self.resampler {
            Resampler::Nearest => {
                let region = supply.read_region(
                    self.location_x,
                    self.location_y,
                    self.read_width as u32,
                    self.read_height as u32,
                )?;
                resample_nearest(&region, self.frame_width, self.frame_height)
            }
            Resampler::Bilinear => resample_bilinear(
                supply,
                self.location_x,
                self.location_y,
                self.read_width,
                self.read_height,
                self.frame_width,
                self.frame_height,
                self.target_level_width,
                self.target_level_height,
            )?,
            Resampler::Filtered(kernel) => resample_filtered(
                supply,
                self.location_x,
                self.location_y,
                self.read_width,
                self.read_height,
                self.frame_width,
                self.frame_height,
                kernel,
            )?,
        };

        let encoded = self.codec.encode(&tile, self.quality)?;
        let raw_cache = if self.store_raw {
            Some(compress_bytes(tile.data())?)
        } else {
            None
        };

        let mut inner = self.inner.lock();
        inner.encoded = Some(encoded);
        inner.raw_cache = raw_cache;
        inner.state = FrameState::Encoded;
        self.completed.notify_all();
        Ok(())
    }

    /// Block until the frame is Encoded (or Failed).
    pub fn wait_encoded(&self) -> Result<(), ConvertError> {
        let mut inner = self.inner.lock();
        loop {
            match &inner.state {
                FrameState::Encoded | FrameState::Emitted => return Ok(()),
                FrameState::Failed(message) => {
                    return Err(ConvertError::Source(SourceError::Read(message.clone())))
                }
                FrameState::Pending => self.completed.wait(&mut inner),
            }
        }
    }

    /// Take the encoded payload, marking the frame Emitted.
    pub fn take_encoded(&self) -> Result<Bytes, ConvertError> {
        self.wait_encoded()?;
        let mut inner = self.inner.lock();
        let payload = inner.encoded.take().ok_or_else(|| {
            ConvertError::Source(SourceError::Read(
                "frame payload already emitted".to_string(),
            ))
        })?;
        inner.state = FrameState::Emitted;
        Ok(payload)
    }

    /// Whether the raw-pixel cache is currently held.
    pub fn has_raw_cache(&self) -> bool {
        self.inner.lock().raw_cache.is_some()
    }

    /// Register one planned future read of this frame's raw pixels.
    pub fn inc_read_counter(&self) {
        self.inner.lock().read_counter += 1;
    }

    pub fn read_counter(&self) -> i64 {
        self.inner.lock().read_counter
    }

    /// Decompress the raw pixels and release one read lease.
    ///
    /// When the lease count reaches zero the cache is dropped; the
    /// decrement and the drop are one critical section.
    pub fn raw_pixels(&self) -> Result<PixelBuffer, CodecError> {
        let mut inner = self.inner.lock();
        let cache = inner
            .raw_cache
            .as_ref()
            .ok_or_else(|| CodecError::Decode("raw pixel cache not available".to_string()))?;
        let raw = decompress_bytes(cache, self.raw_len())?;
        inner.read_counter -= 1;
        if inner.read_counter <= 0 {
            inner.raw_cache = None;
        }
        drop(inner);
        PixelBuffer::from_vec(self.frame_width, self.frame_height, raw).ok_or(
            CodecError::SizeMismatch {
                expected: self.raw_len(),
                actual: 0,
            },
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
