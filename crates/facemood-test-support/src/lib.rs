//! Test support utilities for facemood.
//!
//! Provides mocks for every core port plus builders for synthetic faces and
//! frames, so the annotation loop can be exercised without a camera or model
//! weights.
//!
//! # Example
//!
//! ```
//! use facemood_test_support::{FaceBuilder, FrameBuilder, MockCaptureSource, MockEstimator};
//!
//! // A 640x480 source whose estimator always sees one happy face
//! let source = MockCaptureSource::new(FrameBuilder::blank(640, 480));
//! let estimator = MockEstimator::returning(vec![FaceBuilder::happy()]);
//! ```

mod builders;
mod mocks;

pub use builders::{FaceBuilder, FrameBuilder};
pub use mocks::{
    MockCaptureSource, MockEstimator, MockResponse, MockTickSink, RecordingOverlay,
};
