//! Capture source port for live frame input.

use crate::domain::{Frame, FrameDimensions};

/// Port for sources that supply a continuously updating frame.
///
/// Implementations own their capture machinery (a child process, a clock
/// over files, a camera) and expose only read access to the latest frame.
pub trait CaptureSource: Send + Sync {
    /// Returns true once a frame is available and the source is still live.
    fn is_ready(&self) -> bool;

    /// Returns the most recent frame, if any.
    fn current_frame(&self) -> Option<Frame>;

    /// Resizes the source's visible surface to match the sampled frame.
    ///
    /// Called on every tick before estimation. Sources without a preview
    /// surface ignore it.
    fn present(&self, _dimensions: FrameDimensions) {}
}
