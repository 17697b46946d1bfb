//! Face-mesh topology and the landmark indices the classifier depends on.
//!
//! The indices below are only meaningful for the 468-point face mesh. A model
//! with a different keypoint layout must ship its own topology, and the
//! classifier refuses faces that do not cover these indices.

use serde::Serialize;

use super::Face;

/// Upper lip centre (inner contour).
pub const TOP_LIP: usize = 13;
/// Lower lip centre (inner contour).
pub const BOTTOM_LIP: usize = 14;
/// Inner end of the left brow.
pub const LEFT_BROW: usize = 107;
/// Inner end of the right brow.
pub const RIGHT_BROW: usize = 336;

/// The 468-point face mesh.
pub const FACE_MESH_468: MeshTopology = MeshTopology {
    name: "face_mesh_468",
    keypoint_count: 468,
};

/// Schema describing how many keypoints a face has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeshTopology {
    /// Topology identifier.
    pub name: &'static str,
    /// Keypoints per face.
    pub keypoint_count: usize,
}

impl MeshTopology {
    /// Verifies a face carries every keypoint this topology defines.
    ///
    /// Longer faces are accepted: refined meshes append points after the
    /// base layout without moving existing indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the face has fewer keypoints than the topology.
    pub fn check(&self, face: &Face) -> anyhow::Result<()> {
        if face.len() < self.keypoint_count {
            anyhow::bail!(
                "face has {} keypoints, {} requires {}",
                face.len(),
                self.name,
                self.keypoint_count
            );
        }
        Ok(())
    }
}
