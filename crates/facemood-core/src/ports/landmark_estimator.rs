//! Landmark estimator port.

use crate::domain::{Face, Frame, MeshTopology};

/// Port for face landmark estimation.
///
/// `estimate` is blocking and CPU heavy; the annotation loop always calls it
/// from a blocking thread, never from the async runtime.
pub trait LandmarkEstimator: Send + Sync {
    /// Estimates landmarks for every face in the frame.
    ///
    /// Faces are ordered by detection confidence, highest first. An empty
    /// vector means no face was found and is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn estimate(&self, frame: &Frame) -> anyhow::Result<Vec<Face>>;

    /// The topology every returned face follows.
    fn topology(&self) -> MeshTopology;
}
