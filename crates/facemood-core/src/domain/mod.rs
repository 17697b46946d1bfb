//! Core domain types for face annotation and emotion labelling.

mod emotion;
mod face;
mod frame;
pub mod topology;

pub use emotion::EmotionLabel;
pub use face::{Face, Keypoint};
pub use frame::{Frame, FrameDimensions};
pub use topology::{MeshTopology, FACE_MESH_468};
