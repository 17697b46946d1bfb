//! Overlay surface port.

use crate::domain::{FrameDimensions, Keypoint};

/// Port for the surface keypoint markers are drawn on.
pub trait OverlaySurface: Send {
    /// Current surface size.
    fn dimensions(&self) -> FrameDimensions;

    /// Resizes the surface. Content after a resize is unspecified until the next `clear`.
    fn resize(&mut self, dimensions: FrameDimensions);

    /// Removes every marker.
    fn clear(&mut self);

    /// Draws one marker centred on the keypoint.
    fn draw_marker(&mut self, at: &Keypoint);

    /// Markers drawn since the last `clear`, in drawing order.
    fn markers(&self) -> &[Keypoint];
}
