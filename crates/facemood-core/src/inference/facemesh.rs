//! 468-point face mesh regressor.
//!
//! Takes a 192x192 face crop and returns 468 `(x, y, z)` landmarks in crop
//! pixels plus a face-presence logit. Weight names follow the `PyTorch` port at
//! <https://github.com/thepowerfuldeez/facemesh.pytorch>.

#![allow(clippy::cast_possible_truncation)]

use anyhow::{Context, Result};
use candle_core::{Device, Module, Tensor};
use candle_nn::{conv2d, prelu, Conv2d, Conv2dConfig, PReLU, VarBuilder};
use image::imageops::FilterType;
use image::DynamicImage;

use super::layers::{reflect_pad_top_left, sigmoid, ResidualBlock};

/// Input crop size.
pub const INPUT_SIZE: usize = 192;
/// Landmarks per face.
pub const NUM_LANDMARKS: usize = 468;

/// Backbone residual blocks after the stem: `(in, out, stride)`.
const BACKBONE: [(usize, usize, usize); 14] = [
    (16, 16, 1),
    (16, 16, 1),
    (16, 32, 2),
    (32, 32, 1),
    (32, 32, 1),
    (32, 64, 2),
    (64, 64, 1),
    (64, 64, 1),
    (64, 128, 2),
    (128, 128, 1),
    (128, 128, 1),
    (128, 128, 2),
    (128, 128, 1),
    (128, 128, 1),
];

/// Raw mesh output for one crop.
#[derive(Debug, Clone)]
pub struct MeshOutput {
    /// `(x, y, z)` per landmark in crop pixels (0..192).
    pub landmarks: Vec<[f32; 3]>,
    /// Face presence probability.
    pub presence: f32,
}

/// One output head: a reducing block stack followed by a 3x3 projection.
struct Head {
    blocks: Vec<ResidualBlock>,
    squeeze: Conv2d,
    squeeze_act: PReLU,
    tail: ResidualBlock,
    project: Conv2d,
}

impl Head {
    /// `depth` is the number of 128-channel blocks before the squeeze.
    fn new(depth: usize, outputs: usize, vb: &VarBuilder) -> candle_core::Result<Self> {
        let blocks = (0..depth)
            .map(|i| {
                let stride = if i == 0 { 2 } else { 1 };
                ResidualBlock::prelu(128, 128, stride, &vb.pp(i.to_string()))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(Self {
            blocks,
            squeeze: conv2d(128, 32, 1, Conv2dConfig::default(), vb.pp(depth.to_string()))?,
            squeeze_act: prelu(Some(32), vb.pp((depth + 1).to_string()))?,
            tail: ResidualBlock::prelu(32, 32, 1, &vb.pp((depth + 2).to_string()))?,
            project: conv2d(
                32,
                outputs,
                3,
                Conv2dConfig::default(),
                vb.pp((depth + 3).to_string()),
            )?,
        })
    }
}

impl Module for Head {
    fn forward(&self, x: &Tensor) -> candle_core::Result<Tensor> {
        let mut h = x.clone();
        for block in &self.blocks {
            h = block.forward(&h)?;
        }
        let h = self.squeeze_act.forward(&self.squeeze.forward(&h)?)?;
        let h = self.tail.forward(&h)?;
        self.project.forward(&h)?.flatten_from(1)
    }
}

/// Face mesh network.
pub struct FaceMesh {
    stem: Conv2d,
    stem_act: PReLU,
    backbone: Vec<ResidualBlock>,
    coord_head: Head,
    conf_head: Head,
    device: Device,
}

impl FaceMesh {
    /// Builds the mesh network from weights.
    ///
    /// # Errors
    ///
    /// Returns an error if weights are missing or mis-shaped.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let stem = conv2d(
            3,
            16,
            3,
            Conv2dConfig {
                stride: 2,
                ..Conv2dConfig::default()
            },
            vb.pp("backbone.0"),
        )?;
        let stem_act = prelu(Some(16), vb.pp("backbone.1"))?;
        let backbone = BACKBONE
            .iter()
            .enumerate()
            .map(|(i, &(cin, cout, stride))| {
                ResidualBlock::prelu(cin, cout, stride, &vb.pp(format!("backbone.{}", i + 2)))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(Self {
            stem,
            stem_act,
            backbone,
            coord_head: Head::new(3, NUM_LANDMARKS * 3, &vb.pp("coord_head"))?,
            conf_head: Head::new(1, 1, &vb.pp("conf_head"))?,
            device: vb.device().clone(),
        })
    }

    /// Runs the mesh on a face crop of any size; it is resized to 192x192.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    pub fn estimate(&self, crop: &DynamicImage) -> Result<MeshOutput> {
        let input = self.preprocess(crop)?;
        let (coords, presence) = self.forward(&input).context("Face mesh forward pass failed")?;

        let coords = coords.flatten_all()?.to_vec1::<f32>()?;
        let presence = presence.flatten_all()?.to_vec1::<f32>()?;
        let logit = presence.first().copied().unwrap_or(f32::NEG_INFINITY);

        Ok(MeshOutput {
            landmarks: coords.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
            presence: sigmoid(logit),
        })
    }

    fn preprocess(&self, crop: &DynamicImage) -> Result<Tensor> {
        let side = INPUT_SIZE as u32;
        let rgb = crop.resize_exact(side, side, FilterType::Triangle).to_rgb8();
        let data: Vec<f32> = rgb
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 127.5 - 1.0)
            .collect();

        Tensor::from_vec(data, (1, INPUT_SIZE, INPUT_SIZE, 3), &self.device)?
            .permute((0, 3, 1, 2))?
            .contiguous()
            .context("Failed to build mesh input")
    }

    fn forward(&self, x: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let x = reflect_pad_top_left(x)?;
        let mut h = self.stem_act.forward(&self.stem.forward(&x)?)?;
        for block in &self.backbone {
            h = block.forward(&h)?;
        }
        Ok((self.coord_head.forward(&h)?, self.conf_head.forward(&h)?))
    }
}
