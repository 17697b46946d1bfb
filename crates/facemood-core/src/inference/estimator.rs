//! Two-stage face landmark estimator: detector boxes seed the mesh regressor.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

use std::path::PathBuf;

use anyhow::Result;
use image::GenericImageView;
use serde::Deserialize;
use tracing::{debug, trace};

use super::blazeface::{BlazeFace, DetectorConfig, FaceDetection};
use super::device::{select_device, DevicePreference};
use super::facemesh::{self, FaceMesh};
use super::loader::load_model;
use crate::domain::{Face, Frame, FrameDimensions, Keypoint, MeshTopology, FACE_MESH_468};
use crate::ports::LandmarkEstimator;

/// Detector boxes are enlarged by this factor before cropping for the mesh.
const ROI_SCALE: f32 = 1.5;
/// Default number of faces returned per frame.
pub const DEFAULT_MAX_FACES: usize = 1;
/// Default minimum mesh presence probability.
pub const DEFAULT_MIN_FACE_CONFIDENCE: f32 = 0.5;

/// Landmark model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// 468-point face mesh seeded by the short-range detector.
    #[default]
    FaceMesh468,
}

impl ModelVariant {
    /// Topology of the faces this variant produces.
    #[must_use]
    pub const fn topology(self) -> MeshTopology {
        match self {
            Self::FaceMesh468 => FACE_MESH_468,
        }
    }
}

/// Execution settings for the estimator.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Device preference.
    pub device: DevicePreference,
    /// Detector weights (safetensors).
    pub detector_weights: PathBuf,
    /// Mesh weights (safetensors).
    pub mesh_weights: PathBuf,
    /// Maximum faces returned per frame.
    pub max_faces: usize,
    /// Minimum detector score.
    pub min_detection_confidence: f32,
    /// Minimum mesh presence probability.
    pub min_face_confidence: f32,
}

impl RuntimeConfig {
    /// Creates a config with default thresholds for the given weight files.
    #[must_use]
    pub fn new(detector_weights: impl Into<PathBuf>, mesh_weights: impl Into<PathBuf>) -> Self {
        Self {
            device: DevicePreference::default(),
            detector_weights: detector_weights.into(),
            mesh_weights: mesh_weights.into(),
            max_faces: DEFAULT_MAX_FACES,
            min_detection_confidence: DetectorConfig::default().score_threshold,
            min_face_confidence: DEFAULT_MIN_FACE_CONFIDENCE,
        }
    }
}

/// Square crop region in frame pixels, clamped to the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOfInterest {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl RegionOfInterest {
    /// Square region around a detection, enlarged by `scale` and clamped to
    /// the frame. Returns `None` if nothing of it lies inside the frame.
    #[must_use]
    pub fn around(detection: &FaceDetection, frame: FrameDimensions, scale: f32) -> Option<Self> {
        let (fw, fh) = (frame.width as f32, frame.height as f32);
        let [x0, y0, x1, y1] = detection.bbox;
        let cx = (x0 + x1) / 2.0 * fw;
        let cy = (y0 + y1) / 2.0 * fh;
        let side = ((x1 - x0) * fw).max((y1 - y0) * fh) * scale;

        let left = (cx - side / 2.0).max(0.0);
        let top = (cy - side / 2.0).max(0.0);
        let right = (cx + side / 2.0).min(fw);
        let bottom = (cy + side / 2.0).min(fh);

        (right - left >= 1.0 && bottom - top >= 1.0).then_some(Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }

    /// Maps a mesh landmark from crop space (0..192) to frame pixels.
    #[must_use]
    pub fn to_frame(&self, point: [f32; 3]) -> Keypoint {
        let size = facemesh::INPUT_SIZE as f32;
        Keypoint::with_depth(
            self.x + point[0] / size * self.width,
            self.y + point[1] / size * self.height,
            point[2] / size * self.width,
        )
    }

    /// Integer pixel rectangle `(x, y, width, height)` for cropping.
    fn pixels(&self) -> (u32, u32, u32, u32) {
        (
            self.x as u32,
            self.y as u32,
            (self.width.round() as u32).max(1),
            (self.height.round() as u32).max(1),
        )
    }
}

/// Face mesh estimator backed by candle.
pub struct FaceMeshEstimator {
    detector: BlazeFace,
    mesh: FaceMesh,
    variant: ModelVariant,
    max_faces: usize,
    min_face_confidence: f32,
}

impl FaceMeshEstimator {
    /// Loads both networks. Blocks while reading weights.
    ///
    /// # Errors
    ///
    /// Returns an error if either weight file is missing or invalid.
    pub fn load(variant: ModelVariant, runtime: &RuntimeConfig) -> Result<Self> {
        let device = select_device(runtime.device);
        let detector_config = DetectorConfig {
            score_threshold: runtime.min_detection_confidence,
            ..DetectorConfig::default()
        };

        debug!("Loading face detector from {}", runtime.detector_weights.display());
        let detector = load_model(&runtime.detector_weights, &device, |vb| {
            BlazeFace::new(vb, detector_config)
        })?;
        debug!("Loading face mesh from {}", runtime.mesh_weights.display());
        let mesh = load_model(&runtime.mesh_weights, &device, FaceMesh::new)?;

        Ok(Self::from_models(
            detector,
            mesh,
            variant,
            runtime.max_faces,
            runtime.min_face_confidence,
        ))
    }

    /// Assembles an estimator from already-built networks.
    #[must_use]
    pub const fn from_models(
        detector: BlazeFace,
        mesh: FaceMesh,
        variant: ModelVariant,
        max_faces: usize,
        min_face_confidence: f32,
    ) -> Self {
        Self {
            detector,
            mesh,
            variant,
            max_faces,
            min_face_confidence,
        }
    }
}

impl LandmarkEstimator for FaceMeshEstimator {
    fn estimate(&self, frame: &Frame) -> Result<Vec<Face>> {
        let image = frame.image();
        let dimensions = frame.dimensions();
        let detections = self.detector.detect(image)?;
        trace!(detections = detections.len(), "face detector finished");

        let mut faces = Vec::new();
        for detection in detections.iter().take(self.max_faces) {
            let Some(roi) = RegionOfInterest::around(detection, dimensions, ROI_SCALE) else {
                continue;
            };
            let (x, y, w, h) = roi.pixels();
            let crop = image.view(x, y, w.min(dimensions.width - x), h.min(dimensions.height - y));
            let output = self.mesh.estimate(&crop.to_image().into())?;

            if output.presence < self.min_face_confidence {
                debug!(presence = output.presence, "mesh rejected detection");
                continue;
            }
            faces.push(Face::new(
                output.landmarks.into_iter().map(|p| roi.to_frame(p)).collect(),
            ));
        }

        Ok(faces)
    }

    fn topology(&self) -> MeshTopology {
        self.variant.topology()
    }
}
