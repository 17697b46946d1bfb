//! facemood core - domain logic, ports and the annotation loop.
//!
//! This crate contains the face and emotion domain types, the port traits the
//! adapters implement, the landmark-distance classifier, the raster overlay,
//! and the candle face mesh estimator.

pub mod annotate;
pub mod classify;
pub mod domain;
pub mod inference;
pub mod label;
pub mod overlay;
pub mod ports;

pub use annotate::{AnnotationLoop, LoopConfig, OverlapPolicy, RunSummary, TickOutcome};
pub use classify::{classify, ClassifierThresholds, EmotionClassifier, FaceMetrics};
pub use domain::{EmotionLabel, Face, Frame, FrameDimensions, Keypoint, MeshTopology};
pub use label::{LabelState, UnmatchedPolicy};
pub use overlay::{MarkerStyle, RasterOverlay};
pub use ports::{
    CaptureSource, FanOut, LandmarkEstimator, NullSink, OverlaySurface, SkipReason, TickEvent,
    TickReport, TickSink,
};
