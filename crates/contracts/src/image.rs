//! Image - pixel/sample buffer handle
//!
//! An `Image` is immutable once built. Cloning it retains another reference;
//! the buffer is released when the last clone is dropped. An image either owns
//! its bytes or is a view over a [`SharedBuffer`] co-owned with sibling views.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Image pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Motion JPEG color
    ColorMjpg,
    /// NV12 color
    ColorNv12,
    /// YUY2 color
    ColorYuy2,
    /// 32-bit BGRA color
    ColorBgra32,
    /// 16-bit depth in millimetres
    Depth16,
    /// 16-bit infrared
    Ir16,
    /// Raw 8-bit samples
    Custom8,
    /// Raw 16-bit samples
    Custom16,
    /// Opaque payload (e.g. raw sensor data)
    Custom,
}

impl ImageFormat {
    /// Bytes per pixel for formats with a fixed pixel size
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            ImageFormat::ColorBgra32 => Some(4),
            ImageFormat::ColorYuy2 | ImageFormat::Depth16 | ImageFormat::Ir16 => Some(2),
            ImageFormat::Custom16 => Some(2),
            ImageFormat::Custom8 | ImageFormat::ColorNv12 => Some(1),
            ImageFormat::ColorMjpg | ImageFormat::Custom => None,
        }
    }

    /// Row stride in bytes for a given width (0 when not applicable)
    pub fn stride_for(self, width: u32) -> usize {
        self.bytes_per_pixel()
            .map(|bpp| bpp * width as usize)
            .unwrap_or(0)
    }
}

/// Hook invoked once when a shared allocation is released
type ReleaseHook = Box<dyn FnOnce(usize) + Send + Sync>;

/// Shared Buffer Wrapper
///
/// Holds one raw allocation shared by several image views. The reference count
/// is the `Arc` strong count; the allocation (and the optional release hook)
/// goes away exactly once, when the last view is dropped.
pub struct SharedBuffer {
    data: Box<[u8]>,
    on_release: Option<ReleaseHook>,
}

impl SharedBuffer {
    /// Wrap an allocation
    pub fn new(data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            data: data.into_boxed_slice(),
            on_release: None,
        })
    }

    /// Wrap an allocation and run `hook(len)` when it is released
    pub fn with_release_hook<F>(data: Vec<u8>, hook: F) -> Arc<Self>
    where
        F: FnOnce(usize) + Send + Sync + 'static,
    {
        Arc::new(Self {
            data: data.into_boxed_slice(),
            on_release: Some(Box::new(hook)),
        })
    }

    /// Allocation size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the allocation is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the whole allocation
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("len", &self.data.len())
            .field("has_release_hook", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for SharedBuffer {
    fn drop(&mut self) {
        if let Some(hook) = self.on_release.take() {
            hook(self.data.len());
        }
    }
}

/// Image metadata fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Pixel format
    pub format: ImageFormat,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row stride in bytes (0 for compressed formats)
    pub stride: usize,
    /// Sensor clock timestamp (µs)
    pub device_timestamp_usec: u64,
    /// Host clock timestamp (ns)
    pub system_timestamp_nsec: u64,
}

impl ImageInfo {
    /// Metadata with the stride derived from format and width
    pub fn new(format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            stride: format.stride_for(width),
            device_timestamp_usec: 0,
            system_timestamp_nsec: 0,
        }
    }

    /// Set the device timestamp (µs)
    pub fn with_device_timestamp(mut self, usec: u64) -> Self {
        self.device_timestamp_usec = usec;
        self
    }

    /// Set the system timestamp (ns)
    pub fn with_system_timestamp(mut self, nsec: u64) -> Self {
        self.system_timestamp_nsec = nsec;
        self
    }
}

enum ImageBuffer {
    Owned(Bytes),
    View {
        shared: Arc<SharedBuffer>,
        range: Range<usize>,
    },
}

struct ImageInner {
    info: ImageInfo,
    buffer: ImageBuffer,
}

/// Reference-counted image handle
#[derive(Clone)]
pub struct Image {
    inner: Arc<ImageInner>,
}

impl Image {
    /// Create an image that solely owns its buffer
    pub fn from_bytes(info: ImageInfo, data: Bytes) -> Self {
        Self {
            inner: Arc::new(ImageInner {
                info,
                buffer: ImageBuffer::Owned(data),
            }),
        }
    }

    /// Create a view over `range` of a shared allocation
    ///
    /// The view retains its own reference on the wrapper.
    pub fn view(
        info: ImageInfo,
        shared: &Arc<SharedBuffer>,
        range: Range<usize>,
    ) -> Result<Self, ContractError> {
        if range.start > range.end || range.end > shared.len() {
            return Err(ContractError::ViewOutOfBounds {
                offset: range.start,
                len: range.end.saturating_sub(range.start),
                capacity: shared.len(),
            });
        }

        Ok(Self {
            inner: Arc::new(ImageInner {
                info,
                buffer: ImageBuffer::View {
                    shared: Arc::clone(shared),
                    range,
                },
            }),
        })
    }

    /// Image metadata
    pub fn info(&self) -> &ImageInfo {
        &self.inner.info
    }

    pub fn format(&self) -> ImageFormat {
        self.inner.info.format
    }

    pub fn width(&self) -> u32 {
        self.inner.info.width
    }

    pub fn height(&self) -> u32 {
        self.inner.info.height
    }

    pub fn stride(&self) -> usize {
        self.inner.info.stride
    }

    pub fn device_timestamp_usec(&self) -> u64 {
        self.inner.info.device_timestamp_usec
    }

    pub fn system_timestamp_nsec(&self) -> u64 {
        self.inner.info.system_timestamp_nsec
    }

    /// Image bytes
    pub fn data(&self) -> &[u8] {
        match &self.inner.buffer {
            ImageBuffer::Owned(bytes) => &bytes[..],
            ImageBuffer::View { shared, range } => &shared.as_slice()[range.clone()],
        }
    }

    /// Buffer size in bytes
    pub fn size(&self) -> usize {
        match &self.inner.buffer {
            ImageBuffer::Owned(bytes) => bytes.len(),
            ImageBuffer::View { range, .. } => range.len(),
        }
    }

    /// Whether the image is a view over a shared allocation
    pub fn is_view(&self) -> bool {
        matches!(self.inner.buffer, ImageBuffer::View { .. })
    }

    /// The shared allocation backing a view
    pub fn shared_buffer(&self) -> Option<&Arc<SharedBuffer>> {
        match &self.inner.buffer {
            ImageBuffer::View { shared, .. } => Some(shared),
            ImageBuffer::Owned(_) => None,
        }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.inner.info.format)
            .field("width", &self.inner.info.width)
            .field("height", &self.inner.info.height)
            .field("size", &self.size())
            .field("device_ts_usec", &self.inner.info.device_timestamp_usec)
            .field("view", &self.is_view())
            .finish()
    }
}
