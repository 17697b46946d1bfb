//! Emotion classification from face-mesh landmark distances.
//!
//! The rule is a fixed threshold cascade over two measurements taken on the
//! primary face, in keypoint pixel units:
//!
//! - `lip_gap`: vertical distance between the inner upper and lower lip.
//! - `brow_span`: horizontal distance between the inner ends of the brows.
//!
//! No normalisation by face size is applied, so the result depends on how
//! large the face appears in the frame.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::topology::{BOTTOM_LIP, LEFT_BROW, RIGHT_BROW, TOP_LIP};
use crate::domain::{EmotionLabel, Face, MeshTopology, FACE_MESH_468};

/// Default lip gap above which a face is labelled happy.
pub const DEFAULT_HAPPY_LIP_GAP: f32 = 9.0;
/// Default lip gap above which a face is labelled neutral.
pub const DEFAULT_NEUTRAL_LIP_GAP: f32 = 5.0;
/// Default brow span above which a closed-lip face is labelled angry.
pub const DEFAULT_ANGRY_BROW_SPAN: f32 = 15.0;

/// Thresholds for the classification cascade. All comparisons are strict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierThresholds {
    /// `lip_gap` above this is happy.
    pub happy_lip_gap: f32,
    /// `lip_gap` above this (and not happy) is neutral.
    pub neutral_lip_gap: f32,
    /// `brow_span` above this (lips closed) is angry.
    pub angry_brow_span: f32,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            happy_lip_gap: DEFAULT_HAPPY_LIP_GAP,
            neutral_lip_gap: DEFAULT_NEUTRAL_LIP_GAP,
            angry_brow_span: DEFAULT_ANGRY_BROW_SPAN,
        }
    }
}

/// Distances measured on one face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceMetrics {
    /// `|top_lip.y - bottom_lip.y|`
    pub lip_gap: f32,
    /// `|left_brow.x - right_brow.x|`
    pub brow_span: f32,
}

impl FaceMetrics {
    /// Measures a face laid out in `topology`.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not cover the topology.
    pub fn measure(face: &Face, topology: MeshTopology) -> Result<Self> {
        topology.check(face)?;

        let point = |index: usize| {
            face.keypoint(index)
                .with_context(|| format!("missing keypoint {index}"))
        };
        let top_lip = point(TOP_LIP)?;
        let bottom_lip = point(BOTTOM_LIP)?;
        let left_brow = point(LEFT_BROW)?;
        let right_brow = point(RIGHT_BROW)?;

        Ok(Self {
            lip_gap: (top_lip.y - bottom_lip.y).abs(),
            brow_span: (left_brow.x - right_brow.x).abs(),
        })
    }
}

/// Threshold classifier over [`FaceMetrics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmotionClassifier {
    thresholds: ClassifierThresholds,
    topology: Option<MeshTopology>,
}

impl EmotionClassifier {
    /// Creates a classifier for the 468-point mesh.
    #[must_use]
    pub const fn new(thresholds: ClassifierThresholds) -> Self {
        Self {
            thresholds,
            topology: None,
        }
    }

    /// Overrides the topology faces are checked against.
    #[must_use]
    pub const fn with_topology(mut self, topology: MeshTopology) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Returns the configured thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// Applies the cascade to precomputed metrics.
    ///
    /// Returns `None` when no branch matches.
    #[must_use]
    pub fn label(&self, metrics: &FaceMetrics) -> Option<EmotionLabel> {
        let t = &self.thresholds;
        if metrics.lip_gap > t.happy_lip_gap {
            Some(EmotionLabel::Happy)
        } else if metrics.lip_gap > t.neutral_lip_gap {
            Some(EmotionLabel::Neutral)
        } else if metrics.brow_span > t.angry_brow_span {
            Some(EmotionLabel::Angry)
        } else {
            None
        }
    }

    /// Measures and classifies a face.
    ///
    /// # Errors
    ///
    /// Returns an error if the face does not follow the classifier's topology.
    pub fn classify(&self, face: &Face) -> Result<(FaceMetrics, Option<EmotionLabel>)> {
        let metrics = FaceMetrics::measure(face, self.topology.unwrap_or(FACE_MESH_468))?;
        Ok((metrics, self.label(&metrics)))
    }
}

/// Classifies a face with the default thresholds.
///
/// # Errors
///
/// Returns an error if the face has fewer than 468 keypoints.
pub fn classify(face: &Face) -> Result<Option<EmotionLabel>> {
    EmotionClassifier::default()
        .classify(face)
        .map(|(_, label)| label)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::Keypoint;

    /// Builds a 468-point face with the given lip gap and brow span.
    fn face(lip_gap: f32, brow_span: f32) -> Face {
        let mut points = vec![Keypoint::new(200.0, 200.0); FACE_MESH_468.keypoint_count];
        points[TOP_LIP] = Keypoint::new(200.0, 240.0);
        points[BOTTOM_LIP] = Keypoint::new(200.0, 240.0 + lip_gap);
        points[LEFT_BROW] = Keypoint::new(190.0, 150.0);
        points[RIGHT_BROW] = Keypoint::new(190.0 + brow_span, 150.0);
        Face::new(points)
    }

    #[test]
    fn test_wide_lip_gap_is_happy() {
        assert_eq!(classify(&face(10.0, 0.0)).unwrap(), Some(EmotionLabel::Happy));
    }

    #[test]
    fn test_moderate_lip_gap_is_neutral() {
        assert_eq!(classify(&face(7.0, 0.0)).unwrap(), Some(EmotionLabel::Neutral));
    }

    #[test]
    fn test_closed_lips_wide_brows_is_angry() {
        assert_eq!(classify(&face(3.0, 20.0)).unwrap(), Some(EmotionLabel::Angry));
    }

    #[test]
    fn test_closed_lips_narrow_brows_is_unlabelled() {
        assert_eq!(classify(&face(3.0, 5.0)).unwrap(), None);
    }

    #[test]
    fn test_lip_gap_wins_over_brows() {
        assert_eq!(classify(&face(7.0, 40.0)).unwrap(), Some(EmotionLabel::Neutral));
    }

    #[test]
    fn test_thresholds_are_strict() {
        assert_eq!(classify(&face(9.0, 0.0)).unwrap(), Some(EmotionLabel::Neutral));
        assert_eq!(classify(&face(5.0, 0.0)).unwrap(), None);
        assert_eq!(classify(&face(5.0, 15.0)).unwrap(), None);
        assert_eq!(classify(&face(5.0, 15.5)).unwrap(), Some(EmotionLabel::Angry));
    }

    #[test]
    fn test_inverted_lips_measure_absolute_gap() {
        let mut f = face(0.0, 0.0);
        let mut points = f.keypoints().to_vec();
        points[TOP_LIP] = Keypoint::new(200.0, 260.0);
        points[BOTTOM_LIP] = Keypoint::new(200.0, 248.0);
        f = Face::new(points);
        let (metrics, label) = EmotionClassifier::default().classify(&f).unwrap();
        assert!((metrics.lip_gap - 12.0).abs() < 1e-6);
        assert_eq!(label, Some(EmotionLabel::Happy));
    }

    #[test]
    fn test_custom_thresholds() {
        let classifier = EmotionClassifier::new(ClassifierThresholds {
            happy_lip_gap: 20.0,
            neutral_lip_gap: 2.0,
            angry_brow_span: 15.0,
        });
        let (_, label) = classifier.classify(&face(10.0, 0.0)).unwrap();
        assert_eq!(label, Some(EmotionLabel::Neutral));
    }

    #[test]
    fn test_short_face_is_rejected() {
        let short = Face::new(vec![Keypoint::default(); 300]);
        assert!(classify(&short).is_err());
    }

    #[test]
    fn test_custom_topology() {
        let small = MeshTopology {
            name: "test",
            keypoint_count: 337,
        };
        let f = Face::new(face(10.0, 0.0).keypoints()[..337].to_vec());
        let classifier = EmotionClassifier::default().with_topology(small);
        let (_, label) = classifier.classify(&f).unwrap();
        assert_eq!(label, Some(EmotionLabel::Happy));
    }
}
