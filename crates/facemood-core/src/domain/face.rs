//! Faces and their landmark keypoints.

use serde::{Deserialize, Serialize};

/// A single face-mesh landmark in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    /// Horizontal position in pixels.
    pub x: f32,
    /// Vertical position in pixels.
    pub y: f32,
    /// Relative depth, when the estimator provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Keypoint {
    /// Creates a 2D keypoint.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    /// Creates a keypoint with depth.
    #[must_use]
    pub const fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z: Some(z) }
    }
}

/// One detected face: an ordered keypoint sequence following a mesh topology.
///
/// Index positions carry meaning (see [`crate::domain::topology`]), so the
/// sequence is never reordered or filtered after estimation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Face {
    keypoints: Vec<Keypoint>,
}

impl Face {
    /// Creates a face from its keypoints in topology order.
    #[must_use]
    pub const fn new(keypoints: Vec<Keypoint>) -> Self {
        Self { keypoints }
    }

    /// Returns all keypoints in topology order.
    #[must_use]
    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Returns the keypoint at a topology index.
    #[must_use]
    pub fn keypoint(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// Number of keypoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Returns true if the face has no keypoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}
