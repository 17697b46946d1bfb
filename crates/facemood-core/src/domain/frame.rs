//! Captured video frames.

use std::fmt;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

/// Pixel dimensions of a frame or surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameDimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameDimensions {
    /// Creates new frame dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either side is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single frame sampled from a capture source.
///
/// The pixel buffer is shared, so cloning a frame is cheap and ticks can hold
/// onto it while the source keeps producing newer frames.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<DynamicImage>,
    sequence: u64,
}

impl Frame {
    /// Wraps an image as frame number `sequence`.
    #[must_use]
    pub fn new(image: DynamicImage, sequence: u64) -> Self {
        Self {
            image: Arc::new(image),
            sequence,
        }
    }

    /// Returns the frame's pixel buffer.
    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Returns the capture sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the frame's pixel dimensions.
    #[must_use]
    pub fn dimensions(&self) -> FrameDimensions {
        let (width, height) = self.image.dimensions();
        FrameDimensions::new(width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_dimensions_follow_image() {
        let frame = Frame::new(DynamicImage::new_rgb8(640, 480), 3);
        assert_eq!(frame.dimensions(), FrameDimensions::new(640, 480));
        assert_eq!(frame.sequence(), 3);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let frame = Frame::new(DynamicImage::new_rgb8(4, 4), 0);
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.image(), copy.image()));
    }

    #[test]
    fn test_dimensions_display() {
        assert_eq!(FrameDimensions::new(1280, 720).to_string(), "1280x720");
        assert!(FrameDimensions::new(0, 720).is_empty());
    }
}
