//! `BlazeFace` short-range face detector.
//!
//! Finds face boxes that seed the mesh regressor. Weight names follow
//! <https://github.com/hollance/BlazeFace-PyTorch> (front camera model), so
//! converted checkpoints load without renaming.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, Conv2d, Conv2dConfig, VarBuilder};
use image::imageops::FilterType;
use image::DynamicImage;

use super::layers::{sigmoid, ResidualBlock};

/// Input image size.
pub const INPUT_SIZE: usize = 128;

/// Anchors on the 16x16 feature map (2 per cell).
const ANCHORS_16: usize = 512;
/// Anchors on the 8x8 feature map (6 per cell).
const ANCHORS_8: usize = 384;
/// Total anchor count.
const NUM_ANCHORS: usize = ANCHORS_16 + ANCHORS_8;
/// Regressor outputs per anchor: box (4) plus six keypoints.
const NUM_COORDS: usize = 16;

/// Default minimum detection score.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.75;
/// Default IoU above which overlapping detections are suppressed.
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.3;

/// A detected face in normalized `[0, 1]` frame coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDetection {
    /// `[x_min, y_min, x_max, y_max]`.
    pub bbox: [f32; 4],
    /// Detection confidence.
    pub score: f32,
    /// Right eye, left eye, nose, mouth, right ear, left ear as `[x, y]`.
    pub keypoints: [[f32; 2]; 6],
}

/// Detector thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Minimum score for a detection to be kept.
    pub score_threshold: f32,
    /// IoU threshold for non-maximum suppression.
    pub nms_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
        }
    }
}

/// Backbone layout: `(in, out, stride)` for each residual block.
const BACKBONE1: [(usize, usize, usize); 11] = [
    (24, 24, 1),
    (24, 28, 1),
    (28, 32, 2),
    (32, 36, 1),
    (36, 42, 1),
    (42, 48, 2),
    (48, 56, 1),
    (56, 64, 1),
    (64, 72, 1),
    (72, 80, 1),
    (80, 88, 1),
];
const BACKBONE2: [(usize, usize, usize); 5] = [
    (88, 96, 2),
    (96, 96, 1),
    (96, 96, 1),
    (96, 96, 1),
    (96, 96, 1),
];

/// `BlazeFace` network with its anchor table.
pub struct BlazeFace {
    stem: Conv2d,
    backbone1: Vec<ResidualBlock>,
    backbone2: Vec<ResidualBlock>,
    // Heads on the 16x16 map (88 channels).
    classifier_8: Conv2d,
    regressor_8: Conv2d,
    // Heads on the 8x8 map (96 channels).
    classifier_16: Conv2d,
    regressor_16: Conv2d,
    anchors: Vec<[f32; 2]>,
    config: DetectorConfig,
    device: Device,
}

impl BlazeFace {
    /// Builds the detector from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if weights are missing or mis-shaped.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder, config: DetectorConfig) -> candle_core::Result<Self> {
        let stem = conv2d(
            3,
            24,
            5,
            Conv2dConfig {
                stride: 2,
                ..Conv2dConfig::default()
            },
            vb.pp("backbone1.0"),
        )?;

        // backbone1.1 is the stem's ReLU.
        let backbone1 = BACKBONE1
            .iter()
            .enumerate()
            .map(|(i, &(cin, cout, stride))| {
                ResidualBlock::relu(cin, cout, stride, &vb.pp(format!("backbone1.{}", i + 2)))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        let backbone2 = BACKBONE2
            .iter()
            .enumerate()
            .map(|(i, &(cin, cout, stride))| {
                ResidualBlock::relu(cin, cout, stride, &vb.pp(format!("backbone2.{i}")))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;

        let head = |cin: usize, cout: usize, name: &str| {
            conv2d(cin, cout, 1, Conv2dConfig::default(), vb.pp(name))
        };

        Ok(Self {
            stem,
            backbone1,
            backbone2,
            classifier_8: head(88, 2, "classifier_8")?,
            regressor_8: head(88, 2 * NUM_COORDS, "regressor_8")?,
            classifier_16: head(96, 6, "classifier_16")?,
            regressor_16: head(96, 6 * NUM_COORDS, "regressor_16")?,
            anchors: anchor_centres(),
            config,
            device: vb.device().clone(),
        })
    }

    /// Returns the detector thresholds.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detects faces, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceDetection>> {
        let input = self.preprocess(image)?;
        let (scores, boxes) = self.forward(&input).context("Face detector forward pass failed")?;
        let scores = scores.flatten_all()?.to_vec1::<f32>()?;
        let boxes = boxes.squeeze(0)?.to_vec2::<f32>()?;

        let candidates = decode(&self.anchors, &scores, &boxes, self.config.score_threshold);
        Ok(suppress(candidates, self.config.nms_threshold))
    }

    /// Resizes to 128x128 and normalizes to `[-1, 1]`, NCHW.
    fn preprocess(&self, image: &DynamicImage) -> Result<Tensor> {
        let side = INPUT_SIZE as u32;
        let rgb = image.resize_exact(side, side, FilterType::Triangle).to_rgb8();
        let data: Vec<f32> = rgb
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 127.5 - 1.0)
            .collect();

        Tensor::from_vec(data, (1, INPUT_SIZE, INPUT_SIZE, 3), &self.device)?
            .permute((0, 3, 1, 2))?
            .contiguous()
            .context("Failed to build detector input")
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let x = x.pad_with_zeros(2, 1, 2)?.pad_with_zeros(3, 1, 2)?;
        let mut h = self.stem.forward(&x)?.relu()?;
        for block in &self.backbone1 {
            h = block.forward(&h)?;
        }
        let map_16 = h.clone();
        for block in &self.backbone2 {
            h = block.forward(&h)?;
        }
        let map_8 = h;

        let flatten = |t: Tensor, rows: usize, cols: usize| {
            t.permute((0, 2, 3, 1))?.reshape((1, rows, cols))
        };
        let c1 = flatten(self.classifier_8.forward(&map_16)?, ANCHORS_16, 1)?;
        let r1 = flatten(self.regressor_8.forward(&map_16)?, ANCHORS_16, NUM_COORDS)?;
        let c2 = flatten(self.classifier_16.forward(&map_8)?, ANCHORS_8, 1)?;
        let r2 = flatten(self.regressor_16.forward(&map_8)?, ANCHORS_8, NUM_COORDS)?;

        Ok((Tensor::cat(&[c1, c2], 1)?, Tensor::cat(&[r1, r2], 1)?))
    }
}

/// Anchor centres for both feature maps, in network output order.
fn anchor_centres() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (grid, per_cell) in [(16_u8, 2), (8_u8, 6)] {
        let size = f32::from(grid);
        for y in 0..grid {
            for x in 0..grid {
                let centre = [(f32::from(x) + 0.5) / size, (f32::from(y) + 0.5) / size];
                anchors.extend(std::iter::repeat(centre).take(per_cell));
            }
        }
    }
    anchors
}

/// Turns raw regressor output into detections above `threshold`.
fn decode(
    anchors: &[[f32; 2]],
    scores: &[f32],
    boxes: &[Vec<f32>],
    threshold: f32,
) -> Vec<FaceDetection> {
    let scale = INPUT_SIZE as f32;
    anchors
        .iter()
        .zip(scores)
        .zip(boxes)
        .filter_map(|((anchor, &logit), raw)| {
            let score = sigmoid(logit);
            if score < threshold || raw.len() < NUM_COORDS {
                return None;
            }

            let cx = anchor[0] + raw[0] / scale;
            let cy = anchor[1] + raw[1] / scale;
            let (w, h) = (raw[2] / scale, raw[3] / scale);

            let mut keypoints = [[0.0_f32; 2]; 6];
            for (k, point) in keypoints.iter_mut().enumerate() {
                *point = [
                    (anchor[0] + raw[4 + 2 * k] / scale).clamp(0.0, 1.0),
                    (anchor[1] + raw[5 + 2 * k] / scale).clamp(0.0, 1.0),
                ];
            }

            Some(FaceDetection {
                bbox: [
                    (cx - w / 2.0).clamp(0.0, 1.0),
                    (cy - h / 2.0).clamp(0.0, 1.0),
                    (cx + w / 2.0).clamp(0.0, 1.0),
                    (cy + h / 2.0).clamp(0.0, 1.0),
                ],
                score,
                keypoints,
            })
        })
        .collect()
}

/// Greedy non-maximum suppression; returns detections best first.
fn suppress(mut detections: Vec<FaceDetection>, threshold: f32) -> Vec<FaceDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<FaceDetection> = Vec::new();
    for candidate in detections {
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            kept.push(candidate);
        }
    }
    kept
}

/// Intersection over union of two `[x_min, y_min, x_max, y_max]` boxes.
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = inter_w * inter_h;
    let union = (a[2] - a[0]) * (a[3] - a[1]) + (b[2] - b[0]) * (b[3] - b[1]) - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use candle_core::DType;

    fn detection(bbox: [f32; 4], score: f32) -> FaceDetection {
        FaceDetection {
            bbox,
            score,
            keypoints: [[0.0; 2]; 6],
        }
    }

    #[test]
    fn test_iou() {
        assert!(iou(&[0.0, 0.0, 0.5, 0.5], &[0.6, 0.6, 1.0, 1.0]).abs() < 1e-6);
        assert!((iou(&[0.0, 0.0, 1.0, 1.0], &[0.0, 0.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
        let expected = 0.0625 / 0.4375;
        assert!((iou(&[0.0, 0.0, 0.5, 0.5], &[0.25, 0.25, 0.75, 0.75]) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_anchor_layout() {
        let anchors = anchor_centres();
        assert_eq!(anchors.len(), NUM_ANCHORS);
        assert_eq!(anchors[0], [0.5 / 16.0, 0.5 / 16.0]);
        assert_eq!(anchors[1], anchors[0]);
        assert_eq!(anchors[ANCHORS_16], [0.5 / 8.0, 0.5 / 8.0]);
    }

    #[test]
    fn test_suppress_keeps_best_of_overlapping() {
        let kept = suppress(
            vec![
                detection([0.1, 0.1, 0.5, 0.5], 0.8),
                detection([0.12, 0.1, 0.52, 0.5], 0.95),
                detection([0.6, 0.6, 0.9, 0.9], 0.9),
            ],
            DEFAULT_NMS_THRESHOLD,
        );
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.95).abs() < 1e-6);
        assert!((kept[1].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_applies_threshold_and_offsets() {
        let anchors = [[0.5, 0.5], [0.25, 0.25]];
        let mut raw = vec![0.0; NUM_COORDS];
        raw[0] = 12.8;
        raw[2] = 32.0;
        raw[3] = 32.0;
        let boxes = vec![raw.clone(), raw];

        let found = decode(&anchors, &[5.0, -5.0], &boxes, DEFAULT_SCORE_THRESHOLD);
        assert_eq!(found.len(), 1);
        let bbox = found[0].bbox;
        assert!((bbox[0] - 0.475).abs() < 1e-5);
        assert!((bbox[2] - 0.725).abs() < 1e-5);
        assert!((bbox[1] - 0.375).abs() < 1e-5);
    }

    #[test]
    fn test_zero_weights_detect_nothing() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let detector = BlazeFace::new(vb, DetectorConfig::default()).unwrap();
        let faces = detector.detect(&DynamicImage::new_rgb8(64, 48)).unwrap();
        assert!(faces.is_empty());
    }
}
