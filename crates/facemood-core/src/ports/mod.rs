//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the annotation loop and the
//! capture, inference and presentation adapters around it.

mod capture_source;
mod landmark_estimator;
mod overlay_surface;
mod tick_sink;

pub use capture_source::CaptureSource;
pub use landmark_estimator::LandmarkEstimator;
pub use overlay_surface::OverlaySurface;
pub use tick_sink::{FanOut, NullSink, SkipReason, TickEvent, TickReport, TickSink};
