//! Capture - a bundle of time-aligned images
//!
//! At most one image per slot plus the sensor temperature at capture time.

use serde::{Deserialize, Serialize};

use crate::Image;

/// Logical image slot inside a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSlot {
    Color,
    Depth,
    Ir,
}

/// Logical input stream feeding the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Color camera
    Color,
    /// Depth engine output (depth and/or IR)
    Depth,
}

impl StreamKind {
    /// Slot holding the image whose timestamp represents this stream.
    ///
    /// The depth stream is keyed on IR so passive-IR sessions without a
    /// depth image are handled the same way.
    pub fn timestamp_slot(self) -> ImageSlot {
        match self {
            StreamKind::Color => ImageSlot::Color,
            StreamKind::Depth => ImageSlot::Ir,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Color => "color",
            StreamKind::Depth => "depth",
        }
    }
}

/// Capture
///
/// Assigning a slot drops (releases) whatever image occupied it before.
#[derive(Debug, Clone)]
pub struct Capture {
    color: Option<Image>,
    depth: Option<Image>,
    ir: Option<Image>,
    temperature_c: f32,
}

impl Default for Capture {
    fn default() -> Self {
        Self::new()
    }
}

impl Capture {
    /// Create an empty capture with an unknown temperature (`NaN`)
    pub fn new() -> Self {
        Self {
            color: None,
            depth: None,
            ir: None,
            temperature_c: f32::NAN,
        }
    }

    pub fn color(&self) -> Option<&Image> {
        self.color.as_ref()
    }

    pub fn depth(&self) -> Option<&Image> {
        self.depth.as_ref()
    }

    pub fn ir(&self) -> Option<&Image> {
        self.ir.as_ref()
    }

    /// Image held in `slot`
    pub fn image(&self, slot: ImageSlot) -> Option<&Image> {
        match slot {
            ImageSlot::Color => self.color.as_ref(),
            ImageSlot::Depth => self.depth.as_ref(),
            ImageSlot::Ir => self.ir.as_ref(),
        }
    }

    /// Replace the image in `slot`, releasing the previous one
    pub fn set_image(&mut self, slot: ImageSlot, image: Option<Image>) {
        *self.slot_mut(slot) = image;
    }

    /// Move the image out of `slot`
    pub fn take_image(&mut self, slot: ImageSlot) -> Option<Image> {
        self.slot_mut(slot).take()
    }

    pub fn set_color(&mut self, image: Option<Image>) {
        self.set_image(ImageSlot::Color, image);
    }

    pub fn set_depth(&mut self, image: Option<Image>) {
        self.set_image(ImageSlot::Depth, image);
    }

    pub fn set_ir(&mut self, image: Option<Image>) {
        self.set_image(ImageSlot::Ir, image);
    }

    /// Sensor temperature in °C (`NaN` when unknown)
    pub fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    pub fn set_temperature_c(&mut self, temperature_c: f32) {
        self.temperature_c = temperature_c;
    }

    /// Device timestamp (µs) of the image representing `stream`
    pub fn timestamp_usec(&self, stream: StreamKind) -> Option<u64> {
        self.image(stream.timestamp_slot())
            .map(Image::device_timestamp_usec)
    }

    /// Whether both a color and a depth/IR image are present
    pub fn is_synchronized(&self) -> bool {
        self.color.is_some() && (self.depth.is_some() || self.ir.is_some())
    }

    /// Whether no slot is populated
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.depth.is_none() && self.ir.is_none()
    }

    fn slot_mut(&mut self, slot: ImageSlot) -> &mut Option<Image> {
        match slot {
            ImageSlot::Color => &mut self.color,
            ImageSlot::Depth => &mut self.depth,
            ImageSlot::Ir => &mut self.ir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ImageFormat, ImageInfo, SharedBuffer};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn make_image(format: ImageFormat, ts: u64) -> Image {
        let info = ImageInfo::new(format, 2, 2).with_device_timestamp(ts);
        Image::from_bytes(info, Bytes::from(vec![0u8; 8]))
    }

    #[test]
    fn test_empty_capture() {
        let capture = Capture::new();
        assert!(capture.is_empty());
        assert!(capture.temperature_c().is_nan());
        assert!(!capture.is_synchronized());
    }

    #[test]
    fn test_set_slot_releases_previous() {
        let releases = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&releases);
        let shared = SharedBuffer::with_release_hook(vec![0u8; 8], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let first = Image::view(ImageInfo::new(ImageFormat::Ir16, 2, 2), &shared, 0..8).unwrap();
        drop(shared);

        let mut capture = Capture::new();
        capture.set_ir(Some(first));
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        capture.set_ir(Some(make_image(ImageFormat::Ir16, 2)));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(capture.ir().unwrap().device_timestamp_usec(), 2);
    }

    #[test]
    fn test_take_moves_image() {
        let mut capture = Capture::new();
        capture.set_color(Some(make_image(ImageFormat::ColorBgra32, 10)));

        let color = capture.take_image(ImageSlot::Color).unwrap();
        assert_eq!(color.device_timestamp_usec(), 10);
        assert!(capture.is_empty());
    }

    #[test]
    fn test_stream_timestamp_slot() {
        assert_eq!(StreamKind::Color.timestamp_slot(), ImageSlot::Color);
        assert_eq!(StreamKind::Depth.timestamp_slot(), ImageSlot::Ir);
    }
}
