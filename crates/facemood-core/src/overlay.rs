//! Raster overlay for keypoint markers.

#![allow(clippy::cast_possible_truncation)]

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

use crate::domain::{Frame, FrameDimensions, Keypoint};
use crate::ports::OverlaySurface;

/// Default marker radius in pixels.
pub const DEFAULT_MARKER_RADIUS: f32 = 1.0;
/// Default marker stroke colour.
pub const DEFAULT_MARKER_COLOR: [u8; 4] = [0x00, 0xFF, 0x00, 0xFF];
/// Default marker stroke width in pixels.
pub const DEFAULT_MARKER_WIDTH: f32 = 2.0;

/// How keypoint markers are stroked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerStyle {
    /// Circle radius in pixels.
    pub radius: f32,
    /// Stroke colour, RGBA.
    pub color: [u8; 4],
    /// Stroke width in pixels, centred on the circle.
    pub line_width: f32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            radius: DEFAULT_MARKER_RADIUS,
            color: DEFAULT_MARKER_COLOR,
            line_width: DEFAULT_MARKER_WIDTH,
        }
    }
}

/// Parses `#RRGGBB` or `#RRGGBBAA` into RGBA.
///
/// # Errors
///
/// Returns an error if the string is not a hex colour.
pub fn parse_hex_color(s: &str) -> Result<[u8; 4]> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        anyhow::bail!("'{s}' is not a #RRGGBB or #RRGGBBAA colour");
    }

    let mut rgba = [0xFF; 4];
    for (i, channel) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
        let pair = &hex[i * 2..i * 2 + 2];
        *channel = u8::from_str_radix(pair, 16)
            .with_context(|| format!("'{s}' is not a #RRGGBB or #RRGGBBAA colour"))?;
    }
    Ok(rgba)
}

/// An RGBA canvas that records the markers drawn on it.
///
/// Cleared pixels are fully transparent so the canvas can be laid over the
/// frame it was fitted to.
pub struct RasterOverlay {
    canvas: RgbaImage,
    markers: Vec<Keypoint>,
    style: MarkerStyle,
}

impl RasterOverlay {
    /// Creates an empty 0x0 overlay.
    #[must_use]
    pub fn new(style: MarkerStyle) -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
            markers: Vec::new(),
            style,
        }
    }

    /// Returns the marker style.
    #[must_use]
    pub const fn style(&self) -> &MarkerStyle {
        &self.style
    }

    /// Returns the canvas.
    #[must_use]
    pub const fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// Lays the overlay over a frame.
    ///
    /// The overlay is anchored at the top-left corner; any part that does not
    /// fit the frame is cropped.
    #[must_use]
    pub fn composite(&self, frame: &Frame) -> RgbaImage {
        let mut base = frame.image().to_rgba8();
        image::imageops::overlay(&mut base, &self.canvas, 0, 0);
        base
    }

    fn stroke(&mut self, at: &Keypoint) {
        let half = self.style.line_width / 2.0;
        let inner = self.style.radius - half;
        let outer = self.style.radius + half;
        if !self.touches_canvas(at, outer) {
            return;
        }
        let center = (at.x.round() as i32, at.y.round() as i32);
        let color = Rgba(self.style.color);

        if inner < 0.5 {
            draw_filled_circle_mut(&mut self.canvas, center, outer.round() as i32, color);
        } else {
            for radius in (inner.round() as i32)..=(outer.round() as i32) {
                draw_hollow_circle_mut(&mut self.canvas, center, radius, color);
            }
        }
    }

    /// Whether a disc of `reach` around `at` overlaps the canvas. Rejects
    /// non-finite points so the pixel casts stay in range.
    fn touches_canvas(&self, at: &Keypoint, reach: f32) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let (width, height) = (self.canvas.width() as f32, self.canvas.height() as f32);
        at.x.is_finite()
            && at.y.is_finite()
            && at.x + reach >= 0.0
            && at.y + reach >= 0.0
            && at.x - reach < width
            && at.y - reach < height
    }
}

impl Default for RasterOverlay {
    fn default() -> Self {
        Self::new(MarkerStyle::default())
    }
}

impl OverlaySurface for RasterOverlay {
    fn dimensions(&self) -> FrameDimensions {
        FrameDimensions::new(self.canvas.width(), self.canvas.height())
    }

    fn resize(&mut self, dimensions: FrameDimensions) {
        if self.dimensions() != dimensions {
            self.canvas = RgbaImage::new(dimensions.width, dimensions.height);
            self.markers.clear();
        }
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        self.markers.clear();
    }

    fn draw_marker(&mut self, at: &Keypoint) {
        self.stroke(at);
        self.markers.push(*at);
    }

    fn markers(&self) -> &[Keypoint] {
        &self.markers
    }
}
