//! Synthetic face and frame builders for testing.

use facemood_core::domain::topology::{BOTTOM_LIP, LEFT_BROW, RIGHT_BROW, TOP_LIP};
use facemood_core::domain::{Face, Frame, Keypoint, FACE_MESH_468};
use image::{DynamicImage, Rgb, RgbImage};

/// Keypoints per row of the synthetic grid layout.
const GRID_COLUMNS: usize = 26;
/// Spacing between grid keypoints in pixels.
const GRID_SPACING: f32 = 4.0;

/// Builder for synthetic faces with controlled landmark distances.
///
/// Keypoints are laid out on a grid so every index has a distinct position;
/// the lip and brow indices are then placed to produce the requested
/// `lip_gap` and `brow_span`.
#[derive(Debug, Clone)]
pub struct FaceBuilder {
    origin: (f32, f32),
    lip_gap: f32,
    brow_span: f32,
    keypoint_count: usize,
}

impl Default for FaceBuilder {
    fn default() -> Self {
        Self {
            origin: (100.0, 100.0),
            lip_gap: 0.0,
            brow_span: 0.0,
            keypoint_count: FACE_MESH_468.keypoint_count,
        }
    }
}

impl FaceBuilder {
    /// Starts a 468-point face with closed lips and touching brows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Face classified as happy (lip gap 10).
    #[must_use]
    pub fn happy() -> Face {
        Self::new().lip_gap(10.0).build()
    }

    /// Face classified as neutral (lip gap 7).
    #[must_use]
    pub fn neutral() -> Face {
        Self::new().lip_gap(7.0).build()
    }

    /// Face classified as angry (lip gap 3, brow span 20).
    #[must_use]
    pub fn angry() -> Face {
        Self::new().lip_gap(3.0).brow_span(20.0).build()
    }

    /// Face that matches no rule (lip gap 3, brow span 5).
    #[must_use]
    pub fn unmatched() -> Face {
        Self::new().lip_gap(3.0).brow_span(5.0).build()
    }

    /// Sets the top-left corner of the layout.
    #[must_use]
    pub const fn at(mut self, x: f32, y: f32) -> Self {
        self.origin = (x, y);
        self
    }

    /// Sets `|top_lip.y - bottom_lip.y|`.
    #[must_use]
    pub const fn lip_gap(mut self, gap: f32) -> Self {
        self.lip_gap = gap;
        self
    }

    /// Sets `|left_brow.x - right_brow.x|`.
    #[must_use]
    pub const fn brow_span(mut self, span: f32) -> Self {
        self.brow_span = span;
        self
    }

    /// Overrides the number of keypoints (to build topology mismatches).
    #[must_use]
    pub const fn keypoint_count(mut self, count: usize) -> Self {
        self.keypoint_count = count;
        self
    }

    /// Builds the face.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn build(&self) -> Face {
        let (ox, oy) = self.origin;
        let mut points: Vec<Keypoint> = (0..self.keypoint_count)
            .map(|i| {
                Keypoint::new(
                    ox + (i % GRID_COLUMNS) as f32 * GRID_SPACING,
                    oy + (i / GRID_COLUMNS) as f32 * GRID_SPACING,
                )
            })
            .collect();

        let centre_x = ox + GRID_SPACING * GRID_COLUMNS as f32 / 2.0;
        let mut place = |index: usize, point: Keypoint| {
            if let Some(slot) = points.get_mut(index) {
                *slot = point;
            }
        };
        place(TOP_LIP, Keypoint::new(centre_x, oy + 50.0));
        place(BOTTOM_LIP, Keypoint::new(centre_x, oy + 50.0 + self.lip_gap));
        place(LEFT_BROW, Keypoint::new(centre_x - 1.0, oy + 10.0));
        place(RIGHT_BROW, Keypoint::new(centre_x - 1.0 + self.brow_span, oy + 10.0));

        Face::new(points)
    }
}

/// Builder for synthetic frames.
pub struct FrameBuilder;

impl FrameBuilder {
    /// Black RGB frame.
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Frame {
        Self::solid(width, height, [0, 0, 0], 0)
    }

    /// Uniformly coloured RGB frame with the given sequence number.
    #[must_use]
    pub fn solid(width: u32, height: u32, color: [u8; 3], sequence: u64) -> Frame {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        Frame::new(DynamicImage::ImageRgb8(img), sequence)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use facemood_core::{classify, EmotionLabel};

    #[test]
    fn test_presets_classify_as_named() {
        assert_eq!(classify(&FaceBuilder::happy()).unwrap(), Some(EmotionLabel::Happy));
        assert_eq!(classify(&FaceBuilder::neutral()).unwrap(), Some(EmotionLabel::Neutral));
        assert_eq!(classify(&FaceBuilder::angry()).unwrap(), Some(EmotionLabel::Angry));
        assert_eq!(classify(&FaceBuilder::unmatched()).unwrap(), None);
    }

    #[test]
    fn test_keypoints_are_distinct() {
        let face = FaceBuilder::new().lip_gap(12.0).brow_span(30.0).build();
        let mut seen: Vec<(i64, i64)> = face
            .keypoints()
            .iter()
            .map(|k| ((k.x * 10.0) as i64, (k.y * 10.0) as i64))
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 468);
    }

    #[test]
    fn test_short_face() {
        let face = FaceBuilder::new().keypoint_count(10).build();
        assert_eq!(face.len(), 10);
    }

    #[test]
    fn test_frame_builder() {
        let frame = FrameBuilder::solid(8, 6, [1, 2, 3], 7);
        assert_eq!(frame.dimensions().width, 8);
        assert_eq!(frame.sequence(), 7);
    }
}
